//! Turning user content into a frame sequence.

use crate::raster::render_image_async;
use crate::{Bitmap, Color, Error, Rasterizer, Result, MAX_FRAMES};

/// Gap between frames in a preview strip, before scaling.
const PREVIEW_GAP: u32 = 2;

/// Content the user composed.
#[derive(Debug, Clone)]
pub enum Content {
    /// One frame per character.
    Text { text: String, fg: Color, bg: Color },
    /// One frame per encoded image file.
    Images(Vec<Vec<u8>>),
}

/// Trims `text` and keeps at most [`MAX_FRAMES`] characters.
pub fn normalize_text(text: &str) -> String {
    text.trim().chars().take(MAX_FRAMES).collect()
}

/// Rasterizes content into frames of `width` × `height`.
pub async fn compose(
    rasterizer: &Rasterizer,
    content: &Content,
    width: u32,
    height: u32,
) -> Result<Vec<Bitmap>> {
    match content {
        Content::Text { text, fg, bg } => {
            let text = normalize_text(text);
            if text.is_empty() {
                return Err(Error::EmptyText);
            }
            Ok(rasterizer.render_text(&text, *fg, *bg, width, height))
        }
        Content::Images(files) => {
            if files.is_empty() {
                return Err(Error::NoImages);
            }
            if files.len() > MAX_FRAMES {
                return Err(Error::TooManyFrames {
                    count: files.len(),
                    max: MAX_FRAMES,
                });
            }
            let mut frames = Vec::with_capacity(files.len());
            for file in files {
                frames.push(render_image_async(file.clone(), width, height).await);
            }
            Ok(frames)
        }
    }
}

/// Builds a single preview image of all frames, enlarged by `scale`.
pub fn preview_strip(frames: &[Bitmap], scale: u32) -> Result<Bitmap> {
    let scaled = frames
        .iter()
        .map(|f| f.scaled(scale))
        .collect::<Result<Vec<_>>>()?;
    Bitmap::hstack(
        &scaled,
        PREVIEW_GAP.saturating_mul(scale.max(1)),
        Color::TRANSPARENT,
    )
}
