//! RGBA colors with CSS string syntax.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGBA8 color (straight alpha).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    /// Creates an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Creates a color with alpha.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the canonical CSS hex form.
    pub fn to_css(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub(crate) fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        // Hex digits only, since from_str_radix accepts a leading sign
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            4 => Some(Self::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    fn parse_functional(s: &str) -> Option<Self> {
        let (name, rest) = s.split_once('(')?;
        let args = rest.strip_suffix(')')?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let channel = |p: &str| {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            p.parse::<u8>().ok()
        };

        match (name.trim(), parts.as_slice()) {
            ("rgb", [r, g, b]) => Some(Self::rgb(channel(r)?, channel(g)?, channel(b)?)),
            ("rgba", [r, g, b, a]) => {
                let alpha: f32 = a.parse().ok()?;
                if !(0.0..=1.0).contains(&alpha) {
                    return None;
                }
                let a = (alpha * 255.0).round() as u8;
                Some(Self::rgba(channel(r)?, channel(g)?, channel(b)?, a))
            }
            _ => None,
        }
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().to_lowercase();
        let parsed = if trimmed.starts_with("rgb") {
            Self::parse_functional(&trimmed)
        } else {
            Self::parse_hex(trimmed.strip_prefix('#').unwrap_or(&trimmed))
        };
        parsed.ok_or_else(|| Error::InvalidColor(s.to_string()))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_css()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!("#FF0000".parse::<Color>().unwrap(), Color::RED);
        assert_eq!("00ff00".parse::<Color>().unwrap(), Color::rgb(0, 255, 0));
        assert_eq!("#f00".parse::<Color>().unwrap(), Color::RED);
        assert_eq!("#000".parse::<Color>().unwrap(), Color::BLACK);
        assert_eq!(
            "#11223344".parse::<Color>().unwrap(),
            Color::rgba(0x11, 0x22, 0x33, 0x44)
        );
        assert!("invalid".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
    }

    #[test]
    fn test_hex_rejects_sign_and_non_hex() {
        for input in ["#+f0000", "+f0", "#+f0", "+f00000", "#f0-", "##f00", "#f 0"] {
            assert!(input.parse::<Color>().is_err(), "{:?} parsed", input);
        }
    }

    #[test]
    fn test_parse_functional_color() {
        assert_eq!(
            "rgb(10, 20, 30)".parse::<Color>().unwrap(),
            Color::rgb(10, 20, 30)
        );
        assert_eq!(
            "rgba(255, 0, 0, 0.5)".parse::<Color>().unwrap(),
            Color::rgba(255, 0, 0, 128)
        );
        assert!("rgb(300, 0, 0)".parse::<Color>().is_err());
        assert!("rgba(0, 0, 0, 2)".parse::<Color>().is_err());
        assert!("rgb(+10, 20, 30)".parse::<Color>().is_err());
        assert!("rgb(10, , 30)".parse::<Color>().is_err());
    }

    #[test]
    fn test_css_output() {
        assert_eq!(Color::RED.to_css(), "#ff0000");
        assert_eq!(Color::TRANSPARENT.to_css(), "#00000000");
        assert_eq!(Color::rgb(1, 2, 3).to_string(), "#010203");
    }

    #[test]
    fn test_serde_uses_css_string() {
        let json = serde_json::to_string(&Color::RED).unwrap();
        assert_eq!(json, "\"#ff0000\"");
        let back: Color = serde_json::from_str("\"#0000ff\"").unwrap();
        assert_eq!(back, Color::rgb(0, 0, 255));
        assert!(serde_json::from_str::<Color>("\"nope\"").is_err());
    }
}
