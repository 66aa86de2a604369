use std::path::Path;

use anyhow::Context;

use crate::color::Color;
use crate::error::{ImagerError, ImagerResult};
use crate::surface::{JPEG_QUALITY, Rect, ResampleQuality, Surface};
use crate::text::{TextRenderer, TextStyle};

/// Horizontal anchor for text placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Axis policy for ratio-mismatched crops.
///
/// `Auto` resolves to `FitWidth` exactly when the destination ratio exceeds
/// the source ratio, otherwise `FitHeight`; one branch is always taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropPolicy {
    FitWidth,
    FitHeight,
    #[default]
    Auto,
}

enum Fit {
    Width,
    Height,
}

/// An image under composition.
///
/// Owns exactly one pixel buffer at a time. Crop, scale, and border build a
/// complete replacement surface and swap it in atomically, so a failure
/// mid-transform leaves the image untouched and no half-applied state is
/// ever observable. Append and write mutate the buffer in place.
#[derive(Clone, Debug)]
pub struct RasterImage {
    surface: Surface,
    quality: ResampleQuality,
}

impl RasterImage {
    /// Create a blank truecolor canvas.
    pub fn new(width: u32, height: u32) -> ImagerResult<Self> {
        Ok(Self {
            surface: Surface::new(width, height)?,
            quality: ResampleQuality::Fast,
        })
    }

    /// Decode from encoded image bytes.
    pub fn from_bytes(bytes: &[u8]) -> ImagerResult<Self> {
        Ok(Self {
            surface: Surface::decode(bytes)?,
            quality: ResampleQuality::Fast,
        })
    }

    /// Read and decode an image file.
    pub fn from_file(path: impl AsRef<Path>) -> ImagerResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("read image file '{}'", path.display()))?;
        Self::from_bytes(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn quality(&self) -> ResampleQuality {
        self.quality
    }

    /// Toggle between fast and smooth resampling for later transforms.
    pub fn set_quality(&mut self, quality: ResampleQuality) {
        self.quality = quality;
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Flood the canvas with `color`.
    pub fn fill(&mut self, color: Color) {
        color.fill_surface(&mut self.surface);
    }

    /// Crop or letterbox to `target_width x target_height` under `policy`.
    ///
    /// The destination is filled with `background` (opaque white when
    /// `None`) before the source lands, so the backdrop shows wherever the
    /// source does not cover. Equal aspect ratios skip the policy entirely
    /// and resample whole-to-whole. The result replaces the current buffer.
    #[tracing::instrument(skip(self))]
    pub fn crop(
        &mut self,
        target_width: u32,
        target_height: u32,
        policy: CropPolicy,
        background: Option<Color>,
    ) -> ImagerResult<()> {
        if target_width == 0 || target_height == 0 {
            return Err(ImagerError::invalid_argument(format!(
                "crop target must have positive dimensions, got {target_width}x{target_height}"
            )));
        }

        let src_w = f64::from(self.width());
        let src_h = f64::from(self.height());
        let dst_w = f64::from(target_width);
        let dst_h = f64::from(target_height);
        let src_ratio = src_w / src_h;
        let dst_ratio = dst_w / dst_h;

        let mut dst = Surface::new(target_width, target_height)?;
        background.unwrap_or_else(Color::opaque_white).fill_surface(&mut dst);

        let (src_rect, dst_rect) = if dst_ratio == src_ratio {
            (
                Rect::new(0.0, 0.0, src_w, src_h),
                Rect::new(0.0, 0.0, dst_w, dst_h),
            )
        } else {
            let fit = match policy {
                CropPolicy::FitWidth => Fit::Width,
                CropPolicy::FitHeight => Fit::Height,
                CropPolicy::Auto => {
                    if dst_ratio > src_ratio {
                        Fit::Width
                    } else {
                        Fit::Height
                    }
                }
            };

            match fit {
                Fit::Width if dst_ratio > src_ratio => {
                    // Source relatively taller: center-crop vertically.
                    let src_y = (src_h - dst_h * (src_w / dst_w)) / 2.0;
                    (
                        Rect::new(0.0, src_y, src_w, dst_h * (src_w / dst_w)),
                        Rect::new(0.0, 0.0, dst_w, dst_h),
                    )
                }
                Fit::Width => {
                    // Source relatively shorter: letterbox vertically.
                    let dst_y = (dst_h - src_h * (dst_w / src_w)) / 2.0;
                    (
                        Rect::new(0.0, 0.0, src_w, src_h),
                        Rect::new(0.0, dst_y, dst_w, src_h * (dst_w / src_w)),
                    )
                }
                Fit::Height if dst_ratio > src_ratio => {
                    // Source relatively narrower: letterbox horizontally.
                    let dst_x = (dst_w - src_w * (dst_h / src_h)) / 2.0;
                    (
                        Rect::new(0.0, 0.0, src_w, src_h),
                        Rect::new(dst_x, 0.0, src_w * (dst_h / src_h), dst_h),
                    )
                }
                Fit::Height => {
                    // Source relatively wider: center-crop horizontally.
                    let src_x = (src_w - dst_w * (src_h / dst_h)) / 2.0;
                    (
                        Rect::new(src_x, 0.0, dst_w * (src_h / dst_h), src_h),
                        Rect::new(0.0, 0.0, dst_w, dst_h),
                    )
                }
            }
        };

        dst.resample(&self.surface, src_rect, dst_rect, self.quality)?;
        self.surface = dst;
        Ok(())
    }

    /// Resize the whole image by `factor` (floor-rounded dimensions).
    ///
    /// Factors that are non-positive, non-finite, or collapse either
    /// dimension to zero fail with [`ImagerError::InvalidArgument`] and the
    /// image is unchanged.
    #[tracing::instrument(skip(self))]
    pub fn scale(&mut self, factor: f64) -> ImagerResult<()> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ImagerError::invalid_argument(format!(
                "scale factor must be positive and finite, got {factor}"
            )));
        }
        let width = (f64::from(self.width()) * factor).floor() as u32;
        let height = (f64::from(self.height()) * factor).floor() as u32;
        if width == 0 || height == 0 {
            return Err(ImagerError::invalid_argument(format!(
                "scale factor {factor} collapses {}x{} to a zero dimension",
                self.width(),
                self.height()
            )));
        }

        let mut dst = Surface::new(width, height)?;
        dst.resample(
            &self.surface,
            Rect::new(0.0, 0.0, f64::from(self.width()), f64::from(self.height())),
            Rect::new(0.0, 0.0, f64::from(width), f64::from(height)),
            self.quality,
        )?;
        self.surface = dst;
        Ok(())
    }

    /// Surround the image with a colored border (opaque white when `None`).
    pub fn border(
        &mut self,
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        color: Option<Color>,
    ) -> ImagerResult<()> {
        let mut dst = Surface::new(self.width() + left + right, self.height() + top + bottom)?;
        color.unwrap_or_else(Color::opaque_white).fill_surface(&mut dst);
        dst.copy_region(
            &self.surface,
            0,
            0,
            self.width(),
            self.height(),
            i64::from(left),
            i64::from(top),
        );
        self.surface = dst;
        Ok(())
    }

    /// Copy the whole of `other` onto this image at `(dst_x, dst_y)`.
    pub fn append(&mut self, other: &RasterImage, dst_x: i64, dst_y: i64) {
        self.append_region(other, dst_x, dst_y, 0, 0, other.width(), other.height());
    }

    /// Copy a `src_w x src_h` region of `other` starting at
    /// `(src_x, src_y)` onto this image at `(dst_x, dst_y)`.
    ///
    /// Pixel-exact, no resampling; mutates the buffer in place. Regions
    /// reaching outside either canvas are clipped to the overlap; a fully
    /// disjoint region copies nothing.
    pub fn append_region(
        &mut self,
        other: &RasterImage,
        dst_x: i64,
        dst_y: i64,
        src_x: i64,
        src_y: i64,
        src_w: u32,
        src_h: u32,
    ) {
        self.surface
            .copy_region(&other.surface, src_x, src_y, src_w, src_h, dst_x, dst_y);
    }

    /// Write styled text with its baseline origin anchored at `(x, y)`.
    ///
    /// `Center` and `Right` shift the origin left by half of or the whole
    /// measured box width, so the rendered run's right edge lands on `x`
    /// for `Right`. Requires a computed text box.
    pub fn write<R: TextRenderer + ?Sized>(
        &mut self,
        renderer: &R,
        style: &TextStyle,
        x: i64,
        y: i64,
        align: Align,
    ) -> ImagerResult<()> {
        let text_box = style.box_size()?;
        let x = effective_x(x, text_box.width, align);
        renderer.render(&mut self.surface, style, x, y)
    }

    /// Encode as JPEG (quality 70) and write to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> ImagerResult<()> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "saving jpeg");
        self.surface.save_jpeg(path, JPEG_QUALITY)
    }

    /// Encode as JPEG (quality 70) into `writer`.
    ///
    /// Content-type headers are the caller's concern.
    pub fn display<W: std::io::Write>(&self, writer: &mut W) -> ImagerResult<()> {
        self.surface.encode_jpeg(writer, JPEG_QUALITY)
    }
}

fn effective_x(x: i64, box_width: f64, align: Align) -> i64 {
    match align {
        Align::Left => x,
        Align::Center => x - (box_width / 2.0).round() as i64,
        Align::Right => x - box_width.round() as i64,
    }
}
