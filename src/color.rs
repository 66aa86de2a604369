use serde::{Deserialize, Serialize};

use crate::error::{ImagerError, ImagerResult};
use crate::surface::Surface;

/// A validated RGB color with optional alpha.
///
/// Channels are 8-bit. Alpha is stored in the native 0–127 range
/// (0 = opaque, 127 = fully transparent), quantized from the 8-bit input
/// with `floor(127 * a / 255)`. Values are immutable after construction;
/// construction is all-or-nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    red: u8,
    green: u8,
    blue: u8,
    alpha: Option<u8>,
}

impl Color {
    /// Construct an opaque color from 8-bit channels.
    ///
    /// Channels outside `[0, 255]` are rejected with
    /// [`ImagerError::Domain`].
    pub fn rgb(red: i32, green: i32, blue: i32) -> ImagerResult<Self> {
        Self::build(red, green, blue, None)
    }

    /// Construct a color with an 8-bit alpha (0 = opaque, 255 = fully
    /// transparent).
    pub fn rgba(red: i32, green: i32, blue: i32, alpha: i32) -> ImagerResult<Self> {
        Self::build(red, green, blue, Some(alpha))
    }

    /// Parse `#RRGGBB` or `#AARRGGBB` (case-insensitive).
    ///
    /// The 8-digit form carries alpha in the first byte.
    pub fn from_hex(hex: &str) -> ImagerResult<Self> {
        let digits = hex.strip_prefix('#').ok_or_else(|| {
            ImagerError::domain(format!("hex color must start with '#', got \"{hex}\""))
        })?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ImagerError::domain(format!(
                "hex color contains non-hex digits: \"{hex}\""
            )));
        }

        fn byte(pair: &str) -> i32 {
            // Guarded above: two ASCII hex digits always parse.
            i32::from_str_radix(pair, 16).unwrap_or(-1)
        }

        match digits.len() {
            6 => Self::build(byte(&digits[0..2]), byte(&digits[2..4]), byte(&digits[4..6]), None),
            8 => Self::build(
                byte(&digits[2..4]),
                byte(&digits[4..6]),
                byte(&digits[6..8]),
                Some(byte(&digits[0..2])),
            ),
            _ => Err(ImagerError::domain(format!(
                "hex color must be #RRGGBB or #AARRGGBB, got \"{hex}\""
            ))),
        }
    }

    /// Opaque white, the default backdrop for crops and borders.
    pub const fn opaque_white() -> Self {
        Self {
            red: 255,
            green: 255,
            blue: 255,
            alpha: None,
        }
    }

    fn build(red: i32, green: i32, blue: i32, alpha: Option<i32>) -> ImagerResult<Self> {
        for (name, value) in [("red", red), ("green", green), ("blue", blue)] {
            if !(0..=255).contains(&value) {
                return Err(ImagerError::domain(format!(
                    "{name} channel {value} outside [0, 255]"
                )));
            }
        }
        if let Some(a) = alpha
            && !(0..=255).contains(&a)
        {
            return Err(ImagerError::domain(format!("alpha {a} outside [0, 255]")));
        }

        Ok(Self {
            red: red as u8,
            green: green as u8,
            blue: blue as u8,
            alpha: alpha.map(|a| (127 * a / 255) as u8),
        })
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    /// Quantized alpha in the native 0–127 range, `None` when the color was
    /// constructed without one.
    pub fn alpha(&self) -> Option<u8> {
        self.alpha
    }

    /// Pack into a straight-alpha RGBA pixel for drawing operations.
    ///
    /// The native alpha (0 = opaque, 127 = transparent) maps to coverage:
    /// absent alpha is full coverage, 127 is none. The returned pixel is a
    /// plain `Copy` value with no release obligation.
    pub fn materialize(&self) -> image::Rgba<u8> {
        let coverage = match self.alpha {
            None => 255,
            Some(a7) => (((127 - u16::from(a7)) * 255 + 63) / 127) as u8,
        };
        image::Rgba([self.red, self.green, self.blue, coverage])
    }

    /// Flood the entire surface with this color.
    pub fn fill_surface(&self, surface: &mut Surface) {
        surface.fill(self.materialize());
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let fields = if self.alpha.is_some() { 4 } else { 3 };
        let mut st = serializer.serialize_struct("Color", fields)?;
        st.serialize_field("r", &self.red)?;
        st.serialize_field("g", &self.green)?;
        st.serialize_field("b", &self.blue)?;
        if let Some(a7) = self.alpha {
            // Smallest 8-bit alpha that quantizes back to the stored value.
            let a8 = ((u16::from(a7) * 255 + 126) / 127) as u8;
            st.serialize_field("a", &a8)?;
        }
        st.end()
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            RgbaObj {
                r: i32,
                g: i32,
                b: i32,
                a: Option<i32>,
            },
            Arr(Vec<i32>),
        }

        let parsed = match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => Color::from_hex(&s),
            Repr::RgbaObj { r, g, b, a } => match a {
                Some(a) => Color::rgba(r, g, b, a),
                None => Color::rgb(r, g, b),
            },
            Repr::Arr(v) => match v.as_slice() {
                [r, g, b] => Color::rgb(*r, *g, *b),
                [r, g, b, a] => Color::rgba(*r, *g, *b, *a),
                _ => {
                    return Err(serde::de::Error::custom(
                        "rgba array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                    ));
                }
            },
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
