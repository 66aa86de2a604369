use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

use crate::error::{ImagerError, ImagerResult};
use crate::surface::Surface;
use crate::text::{Font, FontBackend, TextMeasurer, TextRenderer, TextStyle};

/// Measures and rasterizes text through `ttf-parser` outlines filled with
/// `tiny-skia`.
///
/// Font files are read once per path and cached for the lifetime of the
/// rasterizer. Identical inputs produce identical output.
#[derive(Debug, Default)]
pub struct FontRasterizer {
    cache: RefCell<HashMap<PathBuf, Vec<u8>>>,
}

impl FontRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&self, path: &Path) -> ImagerResult<()> {
        let mut cache = self.cache.borrow_mut();
        if !cache.contains_key(path) {
            let bytes = std::fs::read(path)
                .with_context(|| format!("read font file '{}'", path.display()))?;
            cache.insert(path.to_path_buf(), bytes);
        }
        Ok(())
    }

    fn with_face<T>(
        &self,
        font: &Font,
        f: impl FnOnce(&ttf_parser::Face<'_>) -> ImagerResult<T>,
    ) -> ImagerResult<T> {
        self.load(font.path())?;
        let cache = self.cache.borrow();
        let Some(data) = cache.get(font.path()) else {
            return Err(ImagerError::validation(format!(
                "font '{}' missing from cache",
                font.path().display()
            )));
        };
        let face = ttf_parser::Face::parse(data, 0).map_err(|e| {
            ImagerError::validation(format!(
                "cannot parse font '{}': {e}",
                font.path().display()
            ))
        })?;
        f(&face)
    }
}

impl TextMeasurer for FontRasterizer {
    fn measure(&self, size: f64, angle_deg: f64, font: &Font, text: &str) -> ImagerResult<[f64; 8]> {
        self.with_face(font, |face| {
            let run = layout_run(face, font.backend(), size, text);
            Ok(rotate_corners(run.advance, run.ascent, run.descent, angle_deg))
        })
    }
}

impl TextRenderer for FontRasterizer {
    /// Rasterize `style` onto `surface` with the baseline origin at
    /// `(x, y)`. Positive angles rotate counter-clockwise around the origin.
    fn render(&self, surface: &mut Surface, style: &TextStyle, x: i64, y: i64) -> ImagerResult<()> {
        self.with_face(style.font(), |face| {
            let run = layout_run(face, style.font().backend(), style.size(), style.text());

            let mut pb = PathBuilder::new();
            for &(glyph, offset) in &run.glyphs {
                let mut outline = OutlinePath {
                    pb: &mut pb,
                    dx: x as f32 + offset as f32,
                    dy: y as f32,
                    scale: run.scale as f32,
                };
                face.outline_glyph(glyph, &mut outline);
            }
            // Whitespace-only runs produce no outline.
            let Some(path) = pb.finish() else {
                return Ok(());
            };

            let mut layer = Pixmap::new(surface.width(), surface.height()).ok_or_else(|| {
                ImagerError::invalid_argument("cannot allocate text layer for surface")
            })?;
            let mut paint = Paint::default();
            let rgba = style.color().materialize();
            paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
            paint.anti_alias = true;

            // tiny-skia rotates clockwise for positive angles; ours are
            // counter-clockwise.
            let transform = Transform::from_rotate_at(-style.angle() as f32, x as f32, y as f32);
            layer.fill_path(&path, &paint, FillRule::Winding, transform, None);

            surface.blend_premul(layer.data())
        })
    }
}

struct GlyphRun {
    glyphs: Vec<(ttf_parser::GlyphId, f64)>,
    advance: f64,
    ascent: f64,
    descent: f64,
    scale: f64,
}

fn layout_run(face: &ttf_parser::Face<'_>, backend: FontBackend, size: f64, text: &str) -> GlyphRun {
    let scale = size / f64::from(face.units_per_em());

    let mut x = 0.0;
    let mut glyphs = Vec::new();
    for ch in text.chars() {
        // Unmapped characters fall back to .notdef with its own advance.
        let glyph = face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
        glyphs.push((glyph, x));

        let mut advance = f64::from(face.glyph_hor_advance(glyph).unwrap_or(0)) * scale;
        if backend == FontBackend::LegacyRaster {
            // Raster-era metric rounding: whole-pixel advances.
            advance = advance.round().max(1.0);
        }
        x += advance;
    }

    GlyphRun {
        glyphs,
        advance: x,
        ascent: f64::from(face.ascender()) * scale,
        descent: -f64::from(face.descender()) * scale,
        scale,
    }
}

/// Corners of the run's box rotated by `angle_deg` (counter-clockwise, y
/// down) about the baseline origin, in GD order: lower-left, lower-right,
/// upper-right, upper-left.
fn rotate_corners(advance: f64, ascent: f64, descent: f64, angle_deg: f64) -> [f64; 8] {
    let corners = [
        (0.0, descent),
        (advance, descent),
        (advance, -ascent),
        (0.0, -ascent),
    ];

    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let mut out = [0.0; 8];
    for (i, (x, y)) in corners.into_iter().enumerate() {
        out[2 * i] = x * cos + y * sin;
        out[2 * i + 1] = -x * sin + y * cos;
    }
    out
}

struct OutlinePath<'a> {
    pb: &'a mut PathBuilder,
    dx: f32,
    dy: f32,
    scale: f32,
}

impl OutlinePath<'_> {
    fn tx(&self, x: f32) -> f32 {
        self.dx + x * self.scale
    }

    fn ty(&self, y: f32) -> f32 {
        // Font coordinates point y up, the surface points y down.
        self.dy - y * self.scale
    }
}

impl ttf_parser::OutlineBuilder for OutlinePath<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        self.pb.move_to(self.tx(x), self.ty(y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.pb.line_to(self.tx(x), self.ty(y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.pb.quad_to(self.tx(x1), self.ty(y1), self.tx(x), self.ty(y));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.pb.cubic_to(
            self.tx(x1),
            self.ty(y1),
            self.tx(x2),
            self.ty(y2),
            self.tx(x),
            self.ty(y),
        );
    }

    fn close(&mut self) {
        self.pb.close();
    }
}
