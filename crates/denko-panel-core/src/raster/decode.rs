//! Image decoding and stretch-fit resampling.

use image::imageops::FilterType;
use tracing::warn;

use crate::{Bitmap, Color, Result};

/// Decodes `bytes` and stretches the image to exactly `width` × `height`.
///
/// Aspect ratio is not preserved. Undecodable input yields a transparent
/// frame.
pub fn render_image(bytes: &[u8], width: u32, height: u32) -> Bitmap {
    match decode_stretched(bytes, width, height) {
        Ok(bitmap) => bitmap,
        Err(e) => {
            warn!("Failed to render image ({} bytes): {}", bytes.len(), e);
            Bitmap::filled(width, height, Color::TRANSPARENT)
        }
    }
}

/// Same as [`render_image`], decoding on the blocking thread pool.
pub async fn render_image_async(bytes: Vec<u8>, width: u32, height: u32) -> Bitmap {
    match tokio::task::spawn_blocking(move || render_image(&bytes, width, height)).await {
        Ok(bitmap) => bitmap,
        Err(e) => {
            warn!("Image render task failed: {}", e);
            Bitmap::filled(width, height, Color::TRANSPARENT)
        }
    }
}

fn decode_stretched(bytes: &[u8], width: u32, height: u32) -> Result<Bitmap> {
    if width == 0 || height == 0 {
        return Ok(Bitmap::filled(width, height, Color::TRANSPARENT));
    }
    let decoded = image::load_from_memory(bytes)?;
    let resized = decoded
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgba8();
    Bitmap::from_rgba8(width, height, resized.into_raw())
}
