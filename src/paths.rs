//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/pillminder/` | `~/.local/share/pillminder/` |
//! | Config | `~/Library/Application Support/pillminder/` | `~/.config/pillminder/` |
//!
//! # Environment Overrides
//!
//! - `PILLMINDER_DATA_DIR` overrides [`data_dir`]
//! - `PILLMINDER_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Resolves to `dirs::data_dir()/pillminder/` by default. Override with
/// the `PILLMINDER_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("PILLMINDER_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("pillminder"))
        .unwrap_or_else(|| PathBuf::from("/tmp/pillminder-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/pillminder/` by default. Override with
/// the `PILLMINDER_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("PILLMINDER_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("pillminder"))
        .unwrap_or_else(|| PathBuf::from("/tmp/pillminder-config"))
}

/// Reminder store directory (`data_dir()/store/`).
#[must_use]
pub fn reminders_dir() -> PathBuf {
    data_dir().join("store")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
