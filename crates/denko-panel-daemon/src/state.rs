//! Application state management.

use anyhow::{Context, Result};
use denko_panel_core::{
    compose, Bitmap, CancelToken, Color, Content, DeviceTarget, Error, HttpTransport,
    JobSnapshot, PlaybackConfig, PresetId, Rasterizer, SendError, UploadSequencer,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::config::{Config, FrameConfig};

const SETTINGS_FILE: &str = "panel.toml";

/// Panel settings persisted to state directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    /// Device address, without scheme.
    #[serde(default)]
    pub address: String,

    /// Target preset slot.
    #[serde(default)]
    pub preset: PresetId,

    /// Glyph color.
    #[serde(default = "default_foreground")]
    pub foreground: Color,

    /// Frame fill color.
    #[serde(default = "default_background")]
    pub background: Color,

    /// Delay between frames in milliseconds (200-10000).
    #[serde(default = "default_interval")]
    pub interval_ms: u32,

    /// Times the sequence plays (1-20).
    #[serde(default = "default_loop_count")]
    pub loop_count: u32,
}

fn default_foreground() -> Color {
    Color::RED
}

fn default_background() -> Color {
    Color::BLACK
}

fn default_interval() -> u32 {
    PlaybackConfig::default().interval_ms()
}

fn default_loop_count() -> u32 {
    PlaybackConfig::default().loop_count()
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            preset: PresetId::default(),
            foreground: default_foreground(),
            background: default_background(),
            interval_ms: default_interval(),
            loop_count: default_loop_count(),
        }
    }
}

/// Partial update of [`PanelSettings`]; absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub address: Option<String>,
    pub preset: Option<PresetId>,
    pub foreground: Option<Color>,
    pub background: Option<Color>,
    pub interval_ms: Option<u32>,
    pub loop_count: Option<u32>,
}

impl PanelSettings {
    /// Applies `update`, rejecting out-of-range playback values.
    fn apply(&self, update: SettingsUpdate) -> Result<Self, Error> {
        let mut next = self.clone();
        if let Some(address) = update.address {
            next.address = address.trim().to_string();
        }
        if let Some(preset) = update.preset {
            next.preset = preset;
        }
        if let Some(fg) = update.foreground {
            next.foreground = fg;
        }
        if let Some(bg) = update.background {
            next.background = bg;
        }
        if let Some(ms) = update.interval_ms {
            next.interval_ms = ms;
        }
        if let Some(count) = update.loop_count {
            next.loop_count = count;
        }
        next.playback()?;
        Ok(next)
    }

    /// Builds the device target, failing on an empty address.
    pub fn target(&self) -> Result<DeviceTarget, Error> {
        DeviceTarget::new(&self.address, self.preset)
    }

    /// Builds the playback configuration.
    pub fn playback(&self) -> Result<PlaybackConfig, Error> {
        PlaybackConfig::new(self.interval_ms, self.loop_count)
    }
}

/// Shared application state.
pub struct AppState {
    /// Frame dimensions content is rasterized at
    frame: FrameConfig,

    /// Directory holding persisted settings
    state_dir: PathBuf,

    settings: RwLock<PanelSettings>,

    rasterizer: Rasterizer,

    sequencer: Arc<UploadSequencer<HttpTransport>>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: Config) -> Result<Self> {
        let state_dir = PathBuf::from(&config.state_dir);
        if let Err(e) = std::fs::create_dir_all(&state_dir) {
            warn!("Failed to create state directory {:?}: {}", state_dir, e);
        }

        let settings = Self::load_settings(&state_dir);

        let rasterizer = match &config.font.path {
            Some(path) => Rasterizer::from_font_file(path)
                .with_context(|| format!("Failed to load font {}", path.display()))?,
            None => Rasterizer::discover(),
        };

        let transport = match config.request_timeout() {
            Some(timeout) => {
                HttpTransport::with_timeout(timeout).context("Failed to build HTTP client")?
            }
            None => HttpTransport::new(),
        };
        let sequencer = UploadSequencer::new(transport).with_throttle(config.throttle());

        info!(
            "Frame size {}x{}, throttle {:?}",
            config.frame.width,
            config.frame.height,
            config.throttle()
        );
        if !settings.address.is_empty() {
            info!("Device: {} preset {}", settings.address, settings.preset);
        }

        Ok(Self {
            frame: config.frame,
            state_dir,
            settings: RwLock::new(settings),
            rasterizer,
            sequencer: Arc::new(sequencer),
        })
    }

    /// Loads panel settings from state directory.
    fn load_settings(state_dir: &Path) -> PanelSettings {
        let settings_file = state_dir.join(SETTINGS_FILE);
        if let Ok(content) = std::fs::read_to_string(&settings_file) {
            match toml::from_str(&content) {
                Ok(settings) => return settings,
                Err(e) => warn!("Ignoring unreadable {:?}: {}", settings_file, e),
            }
        }
        PanelSettings::default()
    }

    /// Saves panel settings to state directory.
    fn save_settings(&self, settings: &PanelSettings) {
        let settings_file = self.state_dir.join(SETTINGS_FILE);
        match toml::to_string_pretty(settings) {
            Ok(content) => {
                if let Err(e) = std::fs::write(&settings_file, content) {
                    warn!("Failed to save panel settings: {}", e);
                }
            }
            Err(e) => {
                warn!("Failed to serialize panel settings: {}", e);
            }
        }
    }

    /// Returns a copy of the current settings.
    pub fn settings(&self) -> PanelSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Validates and stores a settings update.
    pub fn update_settings(&self, update: SettingsUpdate) -> Result<PanelSettings, Error> {
        let next = {
            let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
            let next = settings.apply(update)?;
            *settings = next.clone();
            next
        };
        debug!("Settings updated: {:?}", next);
        self.save_settings(&next);
        Ok(next)
    }

    /// Rasterizes content at the configured frame size.
    pub async fn render(&self, content: &Content) -> Result<Vec<Bitmap>, Error> {
        compose(
            &self.rasterizer,
            content,
            self.frame.width,
            self.frame.height,
        )
        .await
    }

    /// Text content in the stored colors unless overridden.
    pub fn text_content(&self, text: String, fg: Option<Color>, bg: Option<Color>) -> Content {
        let settings = self.settings();
        Content::Text {
            text,
            fg: fg.unwrap_or(settings.foreground),
            bg: bg.unwrap_or(settings.background),
        }
    }

    /// Validates, rasterizes and starts sending `content` in the background.
    ///
    /// Returns once the job is admitted; progress is visible through
    /// [`AppState::job`].
    pub async fn start_send(&self, content: &Content) -> Result<usize, SendError> {
        let settings = self.settings();
        let target = settings.target()?;
        let playback = settings.playback()?;
        if self.job().is_sending() {
            return Err(SendError::Busy);
        }
        let frames = self.render(content).await?;

        let job = self.sequencer.begin(&frames, &CancelToken::new())?;
        let total = frames.len();
        let sequencer = self.sequencer.clone();
        tokio::spawn(async move {
            // Outcome is recorded in the job snapshot and logged by the sequencer.
            let _ = sequencer.run_job(job, &frames, &target, &playback).await;
        });
        Ok(total)
    }

    /// Returns the current job state.
    pub fn job(&self) -> JobSnapshot {
        self.sequencer.jobs().snapshot()
    }

    /// Cancels the active job; returns false when idle.
    pub fn cancel_job(&self) -> bool {
        self.sequencer.cancel()
    }

    /// Share link for the stored address.
    pub fn share_link(&self, base: &str) -> Result<String, Error> {
        self.settings().target()?.share_link(base)
    }
}
