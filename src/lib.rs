#![forbid(unsafe_code)]

//! Raster image composition: ratio-aware crop, scale, borders, sub-image
//! compositing, and rotated text overlays.
//!
//! The crate is built around three pieces: [`Color`] (channel validation,
//! hex parsing, alpha quantization), [`TextStyle`] (rotation-aware text
//! measurement), and [`RasterImage`] (buffer-replacing crop/scale/border
//! transforms plus in-place compositing and text writing). Pixel storage,
//! resampling, and encoding sit behind [`Surface`]; glyph measurement and
//! rasterization behind [`FontRasterizer`].

pub mod color;
pub mod error;
pub mod font;
pub mod raster;
pub mod surface;
pub mod text;

pub use color::Color;
pub use error::{ImagerError, ImagerResult};
pub use font::FontRasterizer;
pub use raster::{Align, CropPolicy, RasterImage};
pub use surface::{Rect, ResampleQuality, Surface};
pub use text::{Font, FontBackend, TextBox, TextMeasurer, TextRenderer, TextStyle};
