//! Rasterization of characters and images into frame bitmaps.
//!
//! Rendering never fails: when a drawing surface cannot be allocated or an
//! image cannot be decoded the result is a blank frame, so one bad item does
//! not abort a whole send.

mod decode;
mod font;
mod glyph;

pub use decode::{render_image, render_image_async};
pub use font::GlyphFont;
pub use glyph::Rasterizer;
