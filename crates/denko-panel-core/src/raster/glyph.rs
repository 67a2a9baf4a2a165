//! Character rendering onto a tiny-skia surface.

use std::path::Path;

use tiny_skia::{Mask, Paint, Pixmap, Rect, Transform};
use tracing::warn;

use super::font::GlyphFont;
use crate::{Bitmap, Color, Result};

/// Renders characters into frame bitmaps.
pub struct Rasterizer {
    font: GlyphFont,
}

impl Rasterizer {
    /// Creates a rasterizer with an explicit glyph font.
    pub fn new(font: GlyphFont) -> Self {
        Self { font }
    }

    /// Creates a rasterizer using the first system sans-serif font found.
    pub fn discover() -> Self {
        Self::new(GlyphFont::discover())
    }

    /// Creates a rasterizer that only uses the built-in bitmap font.
    pub fn builtin() -> Self {
        Self::new(GlyphFont::Builtin)
    }

    /// Creates a rasterizer from a font file.
    pub fn from_font_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(GlyphFont::from_file(path)?))
    }

    /// Returns the glyph font in use.
    pub fn font(&self) -> &GlyphFont {
        &self.font
    }

    /// Renders one character centered on a `bg` filled frame.
    ///
    /// The font size is `width - 2` pixels. If no drawing surface can be
    /// allocated the frame is returned filled with `bg` only.
    pub fn render_glyph(&self, ch: char, fg: Color, bg: Color, width: u32, height: u32) -> Bitmap {
        let Some(mut pixmap) = Pixmap::new(width, height) else {
            warn!("No drawing surface for {}x{} frame", width, height);
            return Bitmap::filled(width, height, bg);
        };
        pixmap.fill(bg.to_skia());

        let Some(mut mask) = Mask::new(width, height) else {
            return Bitmap::from_pixmap(&pixmap);
        };
        let size = width.saturating_sub(2).max(1) as f32;
        self.font.draw_centered(&mut mask, ch, size);

        let mut paint = Paint::default();
        paint.set_color(fg.to_skia());
        if let Some(rect) = Rect::from_xywh(0.0, 0.0, width as f32, height as f32) {
            pixmap.fill_rect(rect, &paint, Transform::identity(), Some(&mask));
        }

        Bitmap::from_pixmap(&pixmap)
    }

    /// Renders each character of `text` into its own frame, in order.
    pub fn render_text(
        &self,
        text: &str,
        fg: Color,
        bg: Color,
        width: u32,
        height: u32,
    ) -> Vec<Bitmap> {
        text.chars()
            .map(|ch| self.render_glyph(ch, fg, bg, width, height))
            .collect()
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::discover()
    }
}
