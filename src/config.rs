//! Configuration for the search hook and CLI.
//!
//! Loaded from a TOML file with two sections:
//!
//! ```toml
//! [federation]
//! shards = ["search-1", "search-2:5986"]
//! default_port = 5985
//! default_limit = 25
//! timeout_seconds = 5
//! failure_policy = "fail_fast"
//! ranking = "sort_key"
//!
//! [log]
//! dir = "/var/log/lucene-federate"
//! file = "lucene-federate-hook.log"
//! level = "info"
//! ```
//!
//! Every field is optional. Command-line `key=value` overrides are applied
//! on top with [`AppConfig::apply_override`].

use std::path::{Path, PathBuf};

use federate_search::{FailurePolicy, FederationConfig, RankingMode, ShardAddress};
use serde::{Deserialize, Serialize};

use crate::error::{HookError, Result};

/// Shard list and federation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationSection {
    /// Shard addresses: `host`, `host:port`, or `http(s)://host:port`.
    pub shards: Vec<String>,
    /// Port for shard addresses that name none.
    pub default_port: u16,
    /// Page size used when the query carries no `limit`.
    pub default_limit: usize,
    /// Per-shard timeout in seconds.
    pub timeout_seconds: u64,
    /// Failure handling across shards.
    pub failure_policy: FailurePolicy,
    /// How hits from different shards are ranked against each other.
    pub ranking: RankingMode,
    /// Custom User-Agent for shard requests.
    pub user_agent: Option<String>,
}

impl Default for FederationSection {
    fn default() -> Self {
        let engine = FederationConfig::default();
        Self {
            shards: vec!["localhost".into()],
            default_port: ShardAddress::DEFAULT_PORT,
            default_limit: engine.default_limit,
            timeout_seconds: engine.timeout_seconds,
            failure_policy: engine.failure_policy,
            ranking: engine.ranking,
            user_agent: engine.user_agent,
        }
    }
}

/// Log destination and verbosity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory holding the hook's log file.
    pub dir: PathBuf,
    /// Log file name inside `dir`.
    pub file: String,
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: crate::paths::logs_dir(),
            file: "lucene-federate-hook.log".into(),
            level: "info".into(),
        }
    }
}

impl LogConfig {
    /// Full path of the log file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub federation: FederationSection,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| HookError::Config(format!("{}: {e}", path.display())))
    }

    /// Load `path` if given, otherwise the default config file if it exists,
    /// otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `path` is missing, or if any file
    /// that exists cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_config_path();
                if default.is_file() {
                    Self::from_file(&default)
                } else {
                    tracing::debug!(path = %default.display(), "no config file; using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HookError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/lucene-federate/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }

    /// Apply one `key=value` override.
    ///
    /// Recognized keys:
    /// - `lucene.host`: replace the shard list with this single host
    /// - `lucene.port`: port for shard addresses that name none
    /// - `lucene.shards`: comma-separated shard list
    /// - `log.dir`: log file directory
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Config`] for a malformed token, an unknown key,
    /// or an invalid port.
    pub fn apply_override(&mut self, token: &str) -> Result<()> {
        let (key, value) = token
            .trim()
            .split_once('=')
            .ok_or_else(|| HookError::Config(format!("expected key=value, got '{token}'")))?;
        let value = value.trim();

        match key.trim() {
            "lucene.host" => self.federation.shards = vec![value.to_string()],
            "lucene.port" => {
                self.federation.default_port = value
                    .parse()
                    .map_err(|_| HookError::Config(format!("invalid port '{value}'")))?;
            }
            "lucene.shards" => {
                self.federation.shards = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "log.dir" => self.log.dir = PathBuf::from(value),
            other => return Err(HookError::Config(format!("unknown option '{other}'"))),
        }
        Ok(())
    }

    /// The engine configuration carried by the `[federation]` section.
    pub fn federation_config(&self) -> FederationConfig {
        FederationConfig {
            default_limit: self.federation.default_limit,
            timeout_seconds: self.federation.timeout_seconds,
            failure_policy: self.federation.failure_policy,
            ranking: self.federation.ranking,
            user_agent: self.federation.user_agent.clone(),
        }
    }

    /// Parse the configured shard list.
    ///
    /// # Errors
    ///
    /// Returns the first address that fails to parse.
    pub fn shard_addresses(&self) -> Result<Vec<ShardAddress>> {
        self.federation
            .shards
            .iter()
            .map(|s| ShardAddress::parse(s, self.federation.default_port).map_err(HookError::from))
            .collect()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero timeout or default limit, or a shard
    /// address that does not parse.
    pub fn validate(&self) -> Result<()> {
        self.federation_config().validate()?;
        self.shard_addresses()?;
        Ok(())
    }
}
