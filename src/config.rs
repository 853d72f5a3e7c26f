//! Configuration types for Grabber

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{GrabberError, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Capture settings
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,
    /// Replay lookup settings
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Capacity of the event subscription channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_event_buffer() -> usize {
    1024
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// How long export waits on any single content resolution
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
    /// Indent the written JSON
    #[serde(default)]
    pub pretty: bool,
}

impl ExportConfig {
    /// Per-task settle timeout
    #[must_use]
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            settle_timeout_ms: default_settle_timeout_ms(),
            pretty: false,
        }
    }
}

fn default_settle_timeout_ms() -> u64 {
    10_000
}

/// Replay lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Retry an `http://` miss as `https://`
    #[serde(default = "default_true")]
    pub upgrade_http: bool,
    /// Response headers copied onto a replayed response (case-insensitive)
    #[serde(default = "default_passthrough_headers")]
    pub passthrough_headers: Vec<String>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            upgrade_http: true,
            passthrough_headers: default_passthrough_headers(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_passthrough_headers() -> Vec<String> {
    vec![
        "accept-ranges".to_string(),
        "content-type".to_string(),
        "vary".to_string(),
    ]
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GrabberError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GrabberError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.recording.event_buffer == 0 {
            return Err(GrabberError::ConfigError(
                "recording.event_buffer must be > 0".to_string(),
            ));
        }

        if self.export.settle_timeout_ms == 0 {
            return Err(GrabberError::ConfigError(
                "export.settle_timeout_ms must be > 0".to_string(),
            ));
        }

        for (i, name) in self.replay.passthrough_headers.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(GrabberError::ConfigError(format!(
                    "replay.passthrough_headers[{i}] cannot be empty"
                )));
            }
        }

        Ok(())
    }
}
