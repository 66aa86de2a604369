use std::path::{Path, PathBuf};

use crate::color::Color;
use crate::error::{ImagerError, ImagerResult};
use crate::surface::Surface;

/// Measurement/rendering backend variant, resolved once from the font path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontBackend {
    /// Modern outline fonts (`.ttf`).
    Outline,
    /// Raster-era fonts with whole-pixel metrics (`.freetype`).
    LegacyRaster,
}

/// A font resource with its backend variant resolved at construction, so no
/// call site re-derives it from the file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Font {
    path: PathBuf,
    backend: FontBackend,
}

impl Font {
    /// Resolve a font file path to its backend variant.
    ///
    /// A `.ttf` suffix selects [`FontBackend::Outline`], `.freetype` selects
    /// [`FontBackend::LegacyRaster`]; the match is ASCII-case-insensitive.
    /// Any other suffix, or a path that is not a file, is rejected with
    /// [`ImagerError::Validation`].
    pub fn resolve(path: impl AsRef<Path>) -> ImagerResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ImagerError::validation(format!(
                "font file not found: '{}'",
                path.display()
            )));
        }

        let suffix = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let backend = match suffix.as_deref() {
            Some("ttf") => FontBackend::Outline,
            Some("freetype") => FontBackend::LegacyRaster,
            _ => {
                return Err(ImagerError::validation(format!(
                    "font '{}' is not a .ttf or .freetype file",
                    path.display()
                )));
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            backend,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backend(&self) -> FontBackend {
        self.backend
    }
}

/// Measured text box dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextBox {
    pub width: f64,
    pub height: f64,
}

/// Measurement collaborator.
///
/// Returns the eight corner coordinates of the rotated glyph box relative
/// to the baseline origin, in GD order: lower-left, lower-right,
/// upper-right, upper-left, as `(x, y)` pairs with y pointing down.
pub trait TextMeasurer {
    fn measure(&self, size: f64, angle_deg: f64, font: &Font, text: &str) -> ImagerResult<[f64; 8]>;
}

/// Rendering collaborator: rasterize styled text onto a surface with the
/// baseline origin at `(x, y)`.
pub trait TextRenderer {
    fn render(&self, surface: &mut Surface, style: &TextStyle, x: i64, y: i64) -> ImagerResult<()>;
}

/// Styled text plus its measured bounding box.
///
/// The box is derived state: it is computed through a [`TextMeasurer`] and
/// cleared by every setter that affects it (text, size, angle, font). There
/// is no automatic dependency tracking; call [`TextStyle::compute_box`]
/// again after such a change.
#[derive(Clone, Debug)]
pub struct TextStyle {
    text: String,
    font: Font,
    size: f64,
    angle: f64,
    color: Color,
    text_box: Option<TextBox>,
}

impl TextStyle {
    /// Validate fields in order (text, size, angle), then measure the
    /// bounding box.
    pub fn new<M: TextMeasurer + ?Sized>(
        text: impl Into<String>,
        size: f64,
        angle: f64,
        color: Color,
        font: Font,
        measurer: &M,
    ) -> ImagerResult<Self> {
        let text = text.into();
        check_text(&text)?;
        check_size(size)?;
        check_angle(angle)?;

        let mut style = Self {
            text,
            font,
            size,
            angle,
            color,
            text_box: None,
        };
        style.compute_box(measurer)?;
        Ok(style)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    /// Rotation in degrees, counter-clockwise positive.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> ImagerResult<()> {
        let text = text.into();
        check_text(&text)?;
        self.text = text;
        self.text_box = None;
        Ok(())
    }

    pub fn set_size(&mut self, size: f64) -> ImagerResult<()> {
        check_size(size)?;
        self.size = size;
        self.text_box = None;
        Ok(())
    }

    pub fn set_angle(&mut self, angle: f64) -> ImagerResult<()> {
        check_angle(angle)?;
        self.angle = angle;
        self.text_box = None;
        Ok(())
    }

    pub fn set_font(&mut self, font: Font) {
        self.font = font;
        self.text_box = None;
    }

    /// Color does not affect the measured box.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Recompute the bounding box from the current fields.
    ///
    /// The angle is reduced with the signed remainder `angle % 180` before
    /// measuring. Which corner pair determines width and height depends on
    /// the reduced angle's quadrant: `[0, 90)` and `(-180, -90]` use the
    /// lower-right/upper-left x distance and lower-left/upper-right y
    /// distance; the remaining quadrants use the other diagonal.
    pub fn compute_box<M: TextMeasurer + ?Sized>(&mut self, measurer: &M) -> ImagerResult<()> {
        let reduced = self.angle % 180.0;
        let c = measurer.measure(self.size, reduced, &self.font, &self.text)?;

        let quadrant_1_or_3 =
            (0.0..90.0).contains(&reduced) || (reduced > -180.0 && reduced <= -90.0);
        let (width, height) = if quadrant_1_or_3 {
            ((c[2] - c[6]).abs(), (c[1] - c[5]).abs())
        } else {
            ((c[0] - c[4]).abs(), (c[3] - c[7]).abs())
        };

        self.text_box = Some(TextBox { width, height });
        Ok(())
    }

    /// The measured box, or [`ImagerError::Validation`] when it is stale.
    pub fn box_size(&self) -> ImagerResult<TextBox> {
        self.text_box.ok_or_else(|| {
            ImagerError::validation(
                "text box not computed; call compute_box after changing text, size, angle, or font",
            )
        })
    }
}

fn check_text(text: &str) -> ImagerResult<()> {
    if text.is_empty() {
        return Err(ImagerError::validation("text must be a non-empty string"));
    }
    Ok(())
}

fn check_size(size: f64) -> ImagerResult<()> {
    if !size.is_finite() || size <= 0.0 {
        return Err(ImagerError::validation(format!(
            "size must be a positive finite number, got {size}"
        )));
    }
    Ok(())
}

fn check_angle(angle: f64) -> ImagerResult<()> {
    if !angle.is_finite() {
        return Err(ImagerError::validation(format!(
            "angle must be a finite number of degrees, got {angle}"
        )));
    }
    Ok(())
}
