//! Tracing subscriber setup for both binaries.
//!
//! The CLI logs to stderr. The hook logs to a file because stdout is its
//! protocol channel and stderr is usually discarded by the host.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::error::{HookError, Result};

/// `RUST_LOG` if set, otherwise `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install a stderr subscriber.
///
/// # Errors
///
/// Returns [`HookError::Config`] if a global subscriber is already set.
pub fn init_stderr(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(level))
        .try_init()
        .map_err(|e| HookError::Config(format!("failed to install logger: {e}")))
}

/// Install a subscriber appending to `config.path()`.
///
/// The returned guard flushes buffered lines when dropped and must be held
/// for the life of the process.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already set.
pub fn init_file(config: &LogConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.dir)?;
    let appender = tracing_appender::rolling::never(&config.dir, &config.file);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(env_filter(&config.level))
        .try_init()
        .map_err(|e| HookError::Config(format!("failed to install logger: {e}")))?;

    Ok(guard)
}
