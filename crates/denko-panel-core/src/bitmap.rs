//! RGBA8 frame bitmap.

use crate::{Color, Error, Result};

/// Largest pixel count a scaled or stacked bitmap may reach.
pub const MAX_PIXELS: u64 = 1 << 24;

/// Owned width × height raster of straight-alpha RGBA8 pixels.
///
/// Bitmaps are immutable once built; the rasterizer produces them and the
/// upload sequencer only reads them.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels.
    width: u32,
    /// Height in pixels.
    height: u32,
    /// Pixel data, 4 bytes per pixel, row-major.
    data: Vec<u8>,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Bitmap {
    /// Creates a bitmap filled with a single color.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&[color.r, color.g, color.b, color.a]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Creates a bitmap from an RGBA8 slice.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::BitmapSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Copies a tiny-skia pixmap, undoing its premultiplied alpha.
    pub(crate) fn from_pixmap(pixmap: &tiny_skia::Pixmap) -> Self {
        let mut data = Vec::with_capacity(pixmap.pixels().len() * 4);
        for pixel in pixmap.pixels() {
            let c = pixel.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            data,
        }
    }

    /// Returns the width of the bitmap.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the bitmap.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the raw RGBA8 data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Gets a pixel at the given coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x < self.width && y < self.height {
            let idx = (y as usize * self.width as usize + x as usize) * 4;
            let p = &self.data[idx..idx + 4];
            Some(Color::rgba(p[0], p[1], p[2], p[3]))
        } else {
            None
        }
    }

    /// Returns true if every pixel equals `color`.
    pub fn is_uniform(&self, color: Color) -> bool {
        self.data
            .chunks_exact(4)
            .all(|p| p == [color.r, color.g, color.b, color.a])
    }

    /// Encodes the bitmap as an 8-bit RGBA PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::EmptyBitmap);
        }

        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.data)?;
        }

        Ok(png_data)
    }

    /// Returns a copy enlarged by an integer factor (nearest neighbour).
    pub fn scaled(&self, factor: u32) -> Result<Self> {
        let factor = factor.max(1);
        let (width, height) = checked_size(
            self.width.checked_mul(factor),
            self.height.checked_mul(factor),
        )?;
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            let src_row = (y / factor) as usize * self.width as usize;
            for x in 0..width {
                let idx = (src_row + (x / factor) as usize) * 4;
                data.extend_from_slice(&self.data[idx..idx + 4]);
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Lays bitmaps out left to right, separated by `gap` pixels of `fill`.
    pub fn hstack(bitmaps: &[Bitmap], gap: u32, fill: Color) -> Result<Self> {
        let height = bitmaps.iter().map(|b| b.height).max().unwrap_or(0);
        let gaps = u32::try_from(bitmaps.len().saturating_sub(1))
            .ok()
            .and_then(|n| gap.checked_mul(n));
        let width = bitmaps
            .iter()
            .try_fold(0u32, |acc, b| acc.checked_add(b.width))
            .zip(gaps)
            .and_then(|(w, g)| w.checked_add(g));
        let (width, height) = checked_size(width, Some(height))?;

        let mut strip = Self::filled(width, height, fill);
        let mut offset_x = 0usize;
        for bitmap in bitmaps {
            let len = bitmap.width as usize * 4;
            for y in 0..bitmap.height as usize {
                let src = y * len;
                let dst = (y * width as usize + offset_x) * 4;
                strip.data[dst..dst + len].copy_from_slice(&bitmap.data[src..src + len]);
            }
            offset_x += bitmap.width as usize + gap as usize;
        }
        Ok(strip)
    }
}

/// Accepts dimensions that did not overflow and stay within [`MAX_PIXELS`].
fn checked_size(width: Option<u32>, height: Option<u32>) -> Result<(u32, u32)> {
    match (width, height) {
        (Some(w), Some(h)) if u64::from(w) * u64::from(h) <= MAX_PIXELS => Ok((w, h)),
        _ => Err(Error::BitmapTooLarge { max: MAX_PIXELS }),
    }
}
