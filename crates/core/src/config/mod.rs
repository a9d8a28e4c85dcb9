use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, WhitneyError};

/// Shortest animation duration the drivers accept, in milliseconds.
pub const MIN_DURATION_MS: f64 = 100.0;

/// Replaces a non-positive or non-finite duration with [`MIN_DURATION_MS`].
pub fn guard_duration(duration_ms: f64) -> f64 {
    if duration_ms.is_finite() && duration_ms > 0.0 {
        duration_ms
    } else {
        tracing::warn!(duration_ms, "non-positive duration, using the minimum");
        MIN_DURATION_MS
    }
}

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub export: ExportSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.export.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Settings for the real-time playback path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Lower bound applied to every duration before it reaches the drivers.
    pub min_duration_ms: f64,
    /// Duration used until the user edits it.
    pub default_duration_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: MIN_DURATION_MS,
            default_duration_secs: 10.0,
        }
    }
}

/// Parameters of a frame-exact export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Logical frames per second of the exported video.
    pub fps: u32,
    /// Extra frames captured at `u = 1` so the video does not end abruptly.
    pub hold_frames: u32,
    /// Target video bitrate in bits per second.
    pub video_bits_per_second: u64,
    pub file_name: String,
    /// Delay before a temporary save handle is released.
    pub release_delay_ms: f64,
}

impl ExportSettings {
    /// Rejects settings that would make the frame plan or the release
    /// schedule meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(WhitneyError::Config("export fps must be at least 1".into()));
        }
        if !(self.release_delay_ms.is_finite() && self.release_delay_ms >= 0.0) {
            return Err(WhitneyError::Config(format!(
                "export release_delay_ms must be a non-negative number, got {}",
                self.release_delay_ms
            )));
        }
        Ok(())
    }

    /// Replaces invalid fields with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.fps == 0 {
            tracing::warn!(fps = defaults.fps, "export fps of 0, using the default");
            self.fps = defaults.fps;
        }
        if !(self.release_delay_ms.is_finite() && self.release_delay_ms >= 0.0) {
            tracing::warn!(
                release_delay_ms = self.release_delay_ms,
                "invalid release delay, using the default"
            );
            self.release_delay_ms = defaults.release_delay_ms;
        }
        self
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            fps: 60,
            hold_frames: 60,
            video_bits_per_second: 8_000_000,
            file_name: "render.webm".to_string(),
            release_delay_ms: 1000.0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "whitney_core=debug,warn").
    pub level: String,
    /// Whether to emit structured JSON logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Animation duration as seen by the drivers, always at least the minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationSetting {
    millis: f64,
    min_ms: f64,
}

impl DurationSetting {
    pub fn new(min_ms: f64) -> Self {
        let min_ms = if min_ms.is_finite() && min_ms > 0.0 {
            min_ms
        } else {
            MIN_DURATION_MS
        };
        Self {
            millis: min_ms,
            min_ms,
        }
    }

    /// Builds a setting from a duration entered in seconds.
    pub fn from_secs(secs: f64, min_ms: f64) -> Self {
        let mut setting = Self::new(min_ms);
        setting.set_secs(secs);
        setting
    }

    pub fn set_secs(&mut self, secs: f64) {
        let millis = secs * 1000.0;
        self.millis = if millis.is_finite() {
            millis.max(self.min_ms)
        } else {
            self.min_ms
        };
    }

    pub fn millis(&self) -> f64 {
        self.millis
    }
}

impl Default for DurationSetting {
    fn default() -> Self {
        Self::new(MIN_DURATION_MS)
    }
}
