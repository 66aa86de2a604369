use std::path::Path;

use anyhow::Context;
use image::{Rgba, RgbaImage, imageops};

use crate::error::{ImagerError, ImagerResult};

/// Fixed JPEG quality used for save/display output.
pub(crate) const JPEG_QUALITY: u8 = 70;

/// Per-image resampling quality toggle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleQuality {
    /// Nearest-neighbor sampling.
    #[default]
    Fast,
    /// Weighted (triangle-filtered) sampling.
    Smooth,
}

impl ResampleQuality {
    fn filter(self) -> imageops::FilterType {
        match self {
            Self::Fast => imageops::FilterType::Nearest,
            Self::Smooth => imageops::FilterType::Triangle,
        }
    }
}

/// Axis-aligned rectangle in surface coordinates.
///
/// Crop geometry produces fractional midpoints; they are rounded to whole
/// pixels at the surface boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn rounded(self) -> (i64, i64, u32, u32) {
        (
            self.x.round() as i64,
            self.y.round() as i64,
            self.width.round().max(0.0) as u32,
            self.height.round().max(0.0) as u32,
        )
    }
}

/// Owned pixel storage plus the raw raster primitives the composition
/// engine builds on: create, decode, flood-fill, resample, exact copy,
/// premultiplied blending, and JPEG encoding.
#[derive(Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Allocate an opaque black truecolor surface.
    pub fn new(width: u32, height: u32) -> ImagerResult<Self> {
        if width == 0 || height == 0 {
            return Err(ImagerError::invalid_argument(format!(
                "surface dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
        })
    }

    /// Decode a surface from encoded image bytes (PNG, JPEG, ...).
    pub fn decode(bytes: &[u8]) -> ImagerResult<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ImagerError::decode(format!("cannot decode image bytes: {e}")))?;
        Ok(Self {
            pixels: decoded.to_rgba8(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Read one pixel.
    ///
    /// Panics when `(x, y)` is outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    /// Flood the whole surface with one pixel value.
    pub fn fill(&mut self, rgba: Rgba<u8>) {
        for px in self.pixels.pixels_mut() {
            *px = rgba;
        }
    }

    /// Resample `src_rect` of `src` into `dst_rect` of this surface.
    ///
    /// Source regions reaching outside `src` are clipped before sampling;
    /// destination pixels outside this surface are discarded.
    pub fn resample(
        &mut self,
        src: &Surface,
        src_rect: Rect,
        dst_rect: Rect,
        quality: ResampleQuality,
    ) -> ImagerResult<()> {
        let (sx, sy, sw, sh) = src_rect.rounded();
        let (dx, dy, dw, dh) = dst_rect.rounded();
        if dw == 0 || dh == 0 {
            return Ok(());
        }

        let sx = sx.max(0) as u32;
        let sy = sy.max(0) as u32;
        if sx >= src.width() || sy >= src.height() {
            return Ok(());
        }
        let sw = sw.min(src.width() - sx);
        let sh = sh.min(src.height() - sy);
        if sw == 0 || sh == 0 {
            return Ok(());
        }

        let region = imageops::crop_imm(&src.pixels, sx, sy, sw, sh).to_image();
        let scaled = imageops::resize(&region, dw, dh, quality.filter());
        self.blit(&scaled, dx, dy);
        Ok(())
    }

    /// Pixel-exact copy of a `src_w x src_h` region of `src` starting at
    /// `(src_x, src_y)` to `(dst_x, dst_y)`, no resampling.
    ///
    /// Regions extending outside either canvas are clipped to the
    /// intersection; a fully disjoint region copies nothing.
    pub fn copy_region(
        &mut self,
        src: &Surface,
        src_x: i64,
        src_y: i64,
        src_w: u32,
        src_h: u32,
        dst_x: i64,
        dst_y: i64,
    ) {
        let mut sx = src_x;
        let mut sy = src_y;
        let mut dx = dst_x;
        let mut dy = dst_y;
        let mut w = i64::from(src_w);
        let mut h = i64::from(src_h);

        if sx < 0 {
            dx -= sx;
            w += sx;
            sx = 0;
        }
        if sy < 0 {
            dy -= sy;
            h += sy;
            sy = 0;
        }
        if dx < 0 {
            sx -= dx;
            w += dx;
            dx = 0;
        }
        if dy < 0 {
            sy -= dy;
            h += dy;
            dy = 0;
        }
        w = w.min(i64::from(src.width()) - sx).min(i64::from(self.width()) - dx);
        h = h.min(i64::from(src.height()) - sy).min(i64::from(self.height()) - dy);
        if w <= 0 || h <= 0 {
            return;
        }

        for row in 0..h as u32 {
            for col in 0..w as u32 {
                let px = *src.pixels.get_pixel(sx as u32 + col, sy as u32 + row);
                self.pixels.put_pixel(dx as u32 + col, dy as u32 + row, px);
            }
        }
    }

    /// Source-over a premultiplied RGBA8 layer of identical dimensions onto
    /// this straight-alpha surface.
    pub(crate) fn blend_premul(&mut self, layer: &[u8]) -> ImagerResult<()> {
        let expected = self.width() as usize * self.height() as usize * 4;
        if layer.len() != expected {
            return Err(ImagerError::invalid_argument(format!(
                "premultiplied layer has {} bytes, surface needs {expected}",
                layer.len()
            )));
        }

        for (d, s) in self.pixels.chunks_exact_mut(4).zip(layer.chunks_exact(4)) {
            let sa = u16::from(s[3]);
            if sa == 0 {
                continue;
            }
            let da = u16::from(d[3]);
            let inv = 255 - sa;
            let out_a = sa as u8 + mul_div255(da, inv);
            for i in 0..3 {
                let dp = mul_div255(u16::from(d[i]), da);
                let outp = u16::from(s[i]) + u16::from(mul_div255(u16::from(dp), inv));
                d[i] = unpremul(outp, u16::from(out_a));
            }
            d[3] = out_a;
        }
        Ok(())
    }

    /// Encode as JPEG at `quality` into `writer`. Alpha is discarded.
    pub fn encode_jpeg<W: std::io::Write>(&self, writer: &mut W, quality: u8) -> ImagerResult<()> {
        let rgb = image::DynamicImage::ImageRgba8(self.pixels.clone()).to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality);
        rgb.write_with_encoder(encoder).context("encode jpeg")?;
        Ok(())
    }

    /// Encode as JPEG at `quality` and persist to `path`.
    pub fn save_jpeg(&self, path: &Path, quality: u8) -> ImagerResult<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("create '{}'", path.display()))?;
        self.encode_jpeg(&mut file, quality)
    }

    fn blit(&mut self, src: &RgbaImage, dst_x: i64, dst_y: i64) {
        let (w, h) = self.pixels.dimensions();
        for (sx, sy, px) in src.enumerate_pixels() {
            let x = dst_x + i64::from(sx);
            let y = dst_y + i64::from(sy);
            if (0..i64::from(w)).contains(&x) && (0..i64::from(h)).contains(&y) {
                self.pixels.put_pixel(x as u32, y as u32, *px);
            }
        }
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn unpremul(channel: u16, alpha: u16) -> u8 {
    if alpha == 0 {
        return 0;
    }
    ((u32::from(channel) * 255 + u32::from(alpha) / 2) / u32::from(alpha)).min(255) as u8
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Surface {
        let mut s = Surface::new(width, height).unwrap();
        s.fill(Rgba(rgba));
        s
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        assert!(matches!(
            Surface::new(0, 10),
            Err(ImagerError::InvalidArgument(_))
        ));
        assert!(matches!(
            Surface::new(10, 0),
            Err(ImagerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn new_surface_is_opaque_black() {
        let s = Surface::new(2, 2).unwrap();
        assert_eq!(s.pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Surface::decode(b"not an image"),
            Err(ImagerError::Decode(_))
        ));
    }

    #[test]
    fn decode_png_round_trip_dimensions() {
        let img = image::RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let s = Surface::decode(&buf).unwrap();
        assert_eq!((s.width(), s.height()), (3, 2));
        assert_eq!(s.pixel(2, 1).0, [9, 8, 7, 255]);
    }

    #[test]
    fn resample_nearest_doubles() {
        let src = solid(2, 2, [10, 20, 30, 255]);
        let mut dst = Surface::new(4, 4).unwrap();
        dst.resample(
            &src,
            Rect::new(0.0, 0.0, 2.0, 2.0),
            Rect::new(0.0, 0.0, 4.0, 4.0),
            ResampleQuality::Fast,
        )
        .unwrap();
        assert_eq!(dst.pixel(3, 3).0, [10, 20, 30, 255]);
    }

    #[test]
    fn resample_clips_source_rect_to_bounds() {
        let src = solid(2, 2, [1, 1, 1, 255]);
        let mut dst = Surface::new(4, 4).unwrap();
        dst.resample(
            &src,
            Rect::new(1.0, 1.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 2.0, 2.0),
            ResampleQuality::Fast,
        )
        .unwrap();
        assert_eq!(dst.pixel(0, 0).0, [1, 1, 1, 255]);
    }

    #[test]
    fn copy_region_clips_to_intersection() {
        let src = solid(4, 4, [50, 0, 0, 255]);
        let mut dst = Surface::new(10, 10).unwrap();

        // Bottom-right overhang: only a 2x2 corner lands.
        dst.copy_region(&src, 0, 0, 4, 4, 8, 8);
        assert_eq!(dst.pixel(8, 8).0, [50, 0, 0, 255]);
        assert_eq!(dst.pixel(9, 9).0, [50, 0, 0, 255]);
        assert_eq!(dst.pixel(7, 7).0, [0, 0, 0, 255]);

        // Negative destination: top-left 2x2 lands.
        let mut dst = Surface::new(10, 10).unwrap();
        dst.copy_region(&src, 0, 0, 4, 4, -2, -2);
        assert_eq!(dst.pixel(0, 0).0, [50, 0, 0, 255]);
        assert_eq!(dst.pixel(1, 1).0, [50, 0, 0, 255]);
        assert_eq!(dst.pixel(2, 2).0, [0, 0, 0, 255]);

        // Fully disjoint: untouched.
        let mut dst = Surface::new(10, 10).unwrap();
        dst.copy_region(&src, 0, 0, 4, 4, 20, 20);
        assert_eq!(dst.pixel(9, 9).0, [0, 0, 0, 255]);
    }

    #[test]
    fn blend_premul_opaque_layer_replaces() {
        let mut dst = solid(1, 1, [255, 255, 255, 255]);
        dst.blend_premul(&[200, 0, 0, 255]).unwrap();
        assert_eq!(dst.pixel(0, 0).0, [200, 0, 0, 255]);
    }

    #[test]
    fn blend_premul_half_coverage_mixes() {
        let mut dst = solid(1, 1, [0, 0, 0, 255]);
        // 50% coverage red, premultiplied.
        dst.blend_premul(&[128, 0, 0, 128]).unwrap();
        let px = dst.pixel(0, 0).0;
        assert!(px[0] > 100 && px[0] < 160, "got {px:?}");
        assert_eq!(px[3], 255);
    }

    #[test]
    fn blend_premul_rejects_length_mismatch() {
        let mut dst = Surface::new(2, 2).unwrap();
        assert!(matches!(
            dst.blend_premul(&[0, 0, 0, 0]),
            Err(ImagerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn encode_jpeg_is_decodable_with_same_dimensions() {
        let s = solid(8, 5, [120, 10, 10, 255]);
        let mut buf = Vec::new();
        s.encode_jpeg(&mut buf, 70).unwrap();

        let back = image::load_from_memory(&buf).unwrap();
        assert_eq!((back.width(), back.height()), (8, 5));
    }
}
