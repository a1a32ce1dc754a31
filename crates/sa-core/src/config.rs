//! Configuration for simpleaudio
//!
//! Stored as TOML under the platform config directory, e.g.
//! `~/.config/simpleaudio/config.toml` on Linux.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stream::{Direction, SampleFormat, StreamParams};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub debug: DebugConfig,
}

/// Which backend implementation drives the stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Queued-buffer backend on the system audio device
    #[default]
    Queued,
    /// Queued-buffer backend on the in-process simulated device
    Simulated,
    /// Discards all audio
    Null,
}

/// Audio stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: BackendKind,
    /// Output device name, default device when unset
    pub device: Option<String>,
    pub rate: u32,
    pub channels: u32,
    pub format: SampleFormat,
    /// Number of device buffers allocated per stream
    pub pool_capacity: usize,
    /// Delay between device polls while waiting, 0 spins
    pub poll_interval_us: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Queued,
            device: None,
            rate: 44100,
            channels: 1,
            format: SampleFormat::S16,
            pool_capacity: 128,
            poll_interval_us: 1000,
        }
    }
}

impl AudioConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Playback parameters for a stream opened from this configuration
    pub fn stream_params(&self, app_name: &str, stream_name: &str) -> StreamParams {
        StreamParams {
            device: self.device.clone(),
            direction: Direction::Playback,
            format: self.format,
            rate: self.rate,
            channels: self.channels,
            app_name: app_name.to_string(),
            stream_name: stream_name.to_string(),
        }
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Diagnostics settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_path: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_to_file: false,
            log_path: PathBuf::from("simpleaudio.log"),
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join("simpleaudio").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults if the file
    /// does not exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
