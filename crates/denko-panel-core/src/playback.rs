//! Playback timing for a preset.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shortest frame interval the device accepts.
pub const MIN_INTERVAL_MS: u32 = 200;
/// Longest frame interval the device accepts.
pub const MAX_INTERVAL_MS: u32 = 10_000;
/// Maximum number of loops.
pub const MAX_LOOP_COUNT: u32 = 20;

/// Frame interval and loop count of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    interval_ms: u32,
    loop_count: u32,
}

impl PlaybackConfig {
    /// Creates a validated playback configuration.
    pub fn new(interval_ms: u32, loop_count: u32) -> Result<Self> {
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval_ms) {
            return Err(Error::InvalidInterval(interval_ms));
        }
        if !(1..=MAX_LOOP_COUNT).contains(&loop_count) {
            return Err(Error::InvalidLoopCount(loop_count));
        }
        Ok(Self {
            interval_ms,
            loop_count,
        })
    }

    /// Creates a configuration from an interval given in seconds.
    pub fn from_seconds(interval_secs: f64, loop_count: u32) -> Result<Self> {
        let ms = (interval_secs * 1000.0).round();
        if !ms.is_finite() || ms < 0.0 || ms > u32::MAX as f64 {
            return Err(Error::InvalidInterval(0));
        }
        Self::new(ms as u32, loop_count)
    }

    /// Returns the frame interval in milliseconds.
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Returns the loop count.
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// Builds the preset configuration body for `total_frames` frames.
    pub fn payload(&self, total_frames: usize) -> PresetPayload {
        PresetPayload {
            total_frames,
            interval: self.interval_ms,
            loop_count: self.loop_count,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            loop_count: 1,
        }
    }
}

/// JSON body of `POST /presets/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPayload {
    pub total_frames: usize,
    /// Milliseconds between frames.
    pub interval: u32,
    pub loop_count: u32,
}
