//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use denko_panel_core::{FRAME_HEIGHT, FRAME_WIDTH};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address (e.g., "0.0.0.0:8787")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory for persisted panel settings
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Delay between frame uploads in milliseconds
    #[serde(default = "default_throttle")]
    pub throttle_ms: u64,

    /// Per-request timeout in milliseconds (0 = client default)
    #[serde(default)]
    pub request_timeout_ms: u64,

    /// Frame configuration
    #[serde(default)]
    pub frame: FrameConfig,

    /// Font configuration
    #[serde(default)]
    pub font: FontConfig,
}

/// Frame size of the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Frame width
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Glyph font selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FontConfig {
    /// Path to a TTF/OTF font; unset to search system fonts
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:8787".to_string()
}

fn default_state_dir() -> String {
    "/var/lib/denko-panel".to_string()
}

fn default_throttle() -> u64 {
    100
}

fn default_width() -> u32 {
    FRAME_WIDTH
}

fn default_height() -> u32 {
    FRAME_HEIGHT
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Returns the throttle delay.
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Returns the request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            state_dir: default_state_dir(),
            throttle_ms: default_throttle(),
            request_timeout_ms: 0,
            frame: FrameConfig::default(),
            font: FontConfig::default(),
        }
    }
}
