//! Denko Panel Core Library
//!
//! Rasterizes text and images into fixed-size frames and uploads them, one
//! frame at a time, to an LED matrix panel that exposes a small HTTP API.

pub mod bitmap;
pub mod cancel;
pub mod color;
pub mod compose;
pub mod error;
pub mod job;
pub mod playback;
pub mod raster;
pub mod sequencer;
pub mod target;
pub mod transport;

use std::time::Duration;

pub use bitmap::Bitmap;
pub use cancel::CancelToken;
pub use color::Color;
pub use compose::{compose, normalize_text, preview_strip, Content};
pub use error::{Error, FailureKind, Result, SendError, TransportError};
pub use job::{JobController, JobHandle, JobOutcome, JobPhase, JobSnapshot};
pub use playback::{PlaybackConfig, PresetPayload};
pub use raster::{render_image, render_image_async, GlyphFont, Rasterizer};
pub use sequencer::{Completed, UploadSequencer};
pub use target::{address_from_link, DeviceTarget, PresetId};
pub use transport::{DeviceTransport, FrameUpload, HttpTransport};

/// Frame dimensions of the LED matrix.
pub const FRAME_WIDTH: u32 = 20;
pub const FRAME_HEIGHT: u32 = 20;

/// Maximum number of frames in one preset.
pub const MAX_FRAMES: usize = 20;

/// Number of preset slots on the device.
pub const PRESET_COUNT: u8 = 4;

/// Pause between frame uploads so the device's HTTP stack keeps up.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);
