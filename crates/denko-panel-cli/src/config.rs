//! Optional defaults file for the CLI.

use anyhow::{Context, Result};
use denko_panel_core::{Color, PresetId};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Device and rendering defaults; command-line flags take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Device address
    pub address: Option<String>,

    /// Target preset slot
    pub preset: Option<PresetId>,

    pub foreground: Option<Color>,

    pub background: Option<Color>,

    /// Seconds between frames
    pub interval: Option<f64>,

    pub loop_count: Option<u32>,

    /// Delay between frame uploads in milliseconds
    pub throttle_ms: Option<u64>,

    /// Outline font for glyphs
    pub font: Option<PathBuf>,
}

impl CliConfig {
    /// Loads defaults from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
