//! Glyph sources: outline fonts via fontdue, or a built-in bitmap font.

use std::convert::Infallible;
use std::path::Path;

use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use fontdue::{Font, FontSettings};
use tiny_skia::Mask;
use tracing::{debug, info};

use crate::{Error, Result};

/// Well-known locations of a regular sans-serif outline font.
const SYSTEM_SANS_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font used to draw glyphs.
pub enum GlyphFont {
    /// Scalable TrueType/OpenType font.
    Outline(Box<Font>),
    /// Built-in 10x20 ASCII bitmap font; its size is fixed.
    Builtin,
}

impl GlyphFont {
    /// Loads an outline font from raw TTF/OTF bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| Error::Font(e.to_string()))?;
        Ok(GlyphFont::Outline(Box::new(font)))
    }

    /// Loads an outline font from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Uses the first system sans-serif font found, else the built-in font.
    pub fn discover() -> Self {
        for path in SYSTEM_SANS_FONTS {
            if !Path::new(path).exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(font) => {
                    debug!("Using font {}", path);
                    return font;
                }
                Err(e) => debug!("Skipping font {}: {}", path, e),
            }
        }
        info!("No system sans-serif font found, using built-in bitmap font");
        GlyphFont::Builtin
    }

    /// Returns true for the built-in bitmap font.
    pub fn is_builtin(&self) -> bool {
        matches!(self, GlyphFont::Builtin)
    }

    /// Writes the coverage of `ch`, centered on the mask, into `mask`.
    pub(crate) fn draw_centered(&self, mask: &mut Mask, ch: char, size: f32) {
        match self {
            GlyphFont::Outline(font) => draw_outline(font, mask, ch, size),
            GlyphFont::Builtin => draw_builtin(mask, ch),
        }
    }
}

fn draw_outline(font: &Font, mask: &mut Mask, ch: char, size: f32) {
    let (metrics, coverage) = font.rasterize(ch, size);
    let (ascent, descent) = font
        .horizontal_line_metrics(size)
        .map(|m| (m.ascent, m.descent))
        .unwrap_or((size * 0.8, -size * 0.2));

    let width = mask.width() as i32;
    let height = mask.height() as i32;

    // Centre alignment on the advance box, middle baseline on the em box.
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let baseline = center_y + (ascent + descent) / 2.0;
    let left = (center_x - metrics.advance_width / 2.0).round() as i32 + metrics.xmin;
    let top = (baseline - (metrics.ymin + metrics.height as i32) as f32).round() as i32;

    let data = mask.data_mut();
    for glyph_y in 0..metrics.height {
        for glyph_x in 0..metrics.width {
            let value = coverage[glyph_y * metrics.width + glyph_x];
            if value == 0 {
                continue;
            }
            let px = left + glyph_x as i32;
            let py = top + glyph_y as i32;
            if px >= 0 && py >= 0 && px < width && py < height {
                let idx = (py * width + px) as usize;
                data[idx] = data[idx].max(value);
            }
        }
    }
}

fn draw_builtin(mask: &mut Mask, ch: char) {
    let mut buf = [0u8; 4];
    let text = ch.encode_utf8(&mut buf);
    let center = Point::new(mask.width() as i32 / 2, mask.height() as i32 / 2);
    let character_style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();

    let mut target = MaskTarget { mask };
    let _ = Text::with_text_style(text, center, character_style, text_style).draw(&mut target);
}

/// Draw target that records lit pixels as full coverage.
struct MaskTarget<'a> {
    mask: &'a mut Mask,
}

impl OriginDimensions for MaskTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.mask.width(), self.mask.height())
    }
}

impl DrawTarget for MaskTarget<'_> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let width = self.mask.width() as i32;
        let height = self.mask.height() as i32;
        let data = self.mask.data_mut();
        for Pixel(point, color) in pixels {
            if color.is_on() && point.x >= 0 && point.y >= 0 && point.x < width && point.y < height
            {
                data[(point.y * width + point.x) as usize] = 255;
            }
        }
        Ok(())
    }
}
