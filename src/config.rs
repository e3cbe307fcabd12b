//! Configuration types for the reminder engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ReminderError, Result};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hardware trigger endpoint settings.
    pub hardware: HardwareConfig,
    /// Polling loop cadence and grace window.
    pub polling: PollingConfig,
    /// Local alert settings.
    pub notification: NotificationConfig,
    /// Reminder storage location.
    pub storage: StorageConfig,
}

/// Hardware trigger endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Base URL of the box controller. Triggers go to `{base_url}/trigger/{box}`.
    pub base_url: String,
    /// Bound on one trigger request, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            base_url: "http://172.20.10.2".to_owned(),
            timeout_ms: 10_000,
        }
    }
}

impl HardwareConfig {
    /// Config for a specific controller URL with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout in milliseconds.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

/// Polling loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Time between ticks, in milliseconds.
    pub interval_ms: u64,
    /// How long after its due time a reminder may still be dispatched.
    pub grace_window_ms: i64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            grace_window_ms: crate::ledger::GRACE_WINDOW_MS,
        }
    }
}

/// Local alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Alert headline. The body is the reminder title.
    pub headline: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            headline: "It's time!".to_owned(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `reminders.json`. `None` uses the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved storage directory.
    #[must_use]
    pub fn resolved_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::paths::reminders_dir)
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ReminderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ReminderError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `config_dir()/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = self.hardware.base_url.trim();
        if url.is_empty() {
            return Err(ReminderError::Config(
                "hardware.base_url must not be empty".to_owned(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ReminderError::Config(format!(
                "hardware.base_url must be an http(s) URL, got '{url}'"
            )));
        }
        if self.hardware.timeout_ms == 0 {
            return Err(ReminderError::Config(
                "hardware.timeout_ms must be positive".to_owned(),
            ));
        }
        if self.polling.interval_ms == 0 {
            return Err(ReminderError::Config(
                "polling.interval_ms must be positive".to_owned(),
            ));
        }
        if self.polling.grace_window_ms < 0 {
            return Err(ReminderError::Config(
                "polling.grace_window_ms must not be negative".to_owned(),
            ));
        }
        Ok(())
    }
}
