//! Filesystem locations for configuration and logs.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! # Environment Overrides
//!
//! - `LUCENE_FEDERATE_CONFIG_DIR` overrides [`config_dir`]
//! - `LUCENE_FEDERATE_LOG_DIR` overrides [`logs_dir`]

use std::path::PathBuf;

const APP_DIR: &str = "lucene-federate";

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/lucene-federate/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LUCENE_FEDERATE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/lucene-federate-config"))
}

/// Default config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Log file directory.
///
/// Resolves to `dirs::data_local_dir()/lucene-federate/logs/` by default.
#[must_use]
pub fn logs_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LUCENE_FEDERATE_LOG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR).join("logs"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lucene-federate-logs"))
}
