//! One-shot federated search, as run by the `lucene-federate` CLI.
//!
//! Every failure, from a bad config file to an unreachable shard, ends up
//! as a [`HookError`] and is written as a `{code, body}` document by
//! [`error_document`].

use std::path::PathBuf;

use federate_search::emit::{emit_error_body, ErrorBody};
use federate_search::{Coordinator, FailurePolicy, Query, RankingMode};

use crate::config::AppConfig;
use crate::error::{HookError, Result};

/// Command-line choices layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Explicit config file; the default location otherwise.
    pub config: Option<PathBuf>,
    /// Replaces the configured shard list when non-empty.
    pub shards: Vec<String>,
    /// Forces the best-effort failure policy.
    pub best_effort: bool,
    pub ranking: Option<RankingMode>,
    pub timeout_seconds: Option<u64>,
}

impl SearchOptions {
    /// Load the config file, apply these options, and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Config`] or [`HookError::Io`] for an unreadable
    /// config file, and the validation error for a bad shard address or
    /// zero timeout.
    pub fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if !self.shards.is_empty() {
            config.federation.shards = self.shards.clone();
        }
        if self.best_effort {
            config.federation.failure_policy = FailurePolicy::BestEffort;
        }
        if let Some(ranking) = self.ranking {
            config.federation.ranking = ranking;
        }
        if let Some(timeout) = self.timeout_seconds {
            config.federation.timeout_seconds = timeout;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Federate `raw_query` across the configured shards and emit the page.
///
/// # Errors
///
/// Returns [`HookError::Federation`] for a malformed query or a failed
/// federation, and a config error for an unparseable shard list.
pub async fn search(config: &AppConfig, raw_query: &str) -> Result<Vec<u8>> {
    let shards = config.shard_addresses()?;
    if shards.is_empty() {
        tracing::warn!("no shards configured; result will be empty");
    }
    let query = Query::parse(raw_query)?;

    let coordinator = Coordinator::http(config.federation_config())?;
    let (mut request, merged) = coordinator.dispatch(&shards, &query).await;
    let bytes = merged.and_then(|merged| request.emit(&merged));
    tracing::info!(request_id = %request.id(), state = %request.state(), "request finished");
    Ok(bytes?)
}

/// The `{code, body}` document printed in place of a result.
pub fn error_document(err: &HookError) -> Vec<u8> {
    emit_error_body(&ErrorBody {
        code: err.code(),
        body: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::{json, Value};

    fn document(err: &HookError) -> Value {
        serde_json::from_slice(&error_document(err)).expect("json")
    }

    #[test]
    fn bad_shard_address_becomes_error_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::default().save_to_file(&path).unwrap();

        let options = SearchOptions {
            config: Some(path),
            shards: vec!["db1:notaport".into()],
            ..SearchOptions::default()
        };
        let err = options.resolve_config().unwrap_err();
        let doc = document(&err);
        assert_eq!(doc["code"], 500);
        assert!(doc["body"].as_str().unwrap().contains("invalid shard address"));
    }

    #[test]
    fn missing_config_file_becomes_error_document() {
        let dir = tempfile::tempdir().unwrap();
        let options = SearchOptions {
            config: Some(dir.path().join("absent.toml")),
            ..SearchOptions::default()
        };
        let err = options.resolve_config().unwrap_err();
        assert!(matches!(err, HookError::Io(_)));
        assert_eq!(document(&err)["code"], 500);
    }

    #[test]
    fn unparseable_config_file_becomes_error_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[federation\nshards = ").unwrap();
        let options = SearchOptions {
            config: Some(path),
            ..SearchOptions::default()
        };
        let err = options.resolve_config().unwrap_err();
        let doc = document(&err);
        assert_eq!(doc["code"], 500);
        assert!(doc["body"].as_str().unwrap().starts_with("config error:"));
    }

    #[test]
    fn options_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::default().save_to_file(&path).unwrap();

        let options = SearchOptions {
            config: Some(path),
            shards: vec!["a".into(), "b:6000".into()],
            best_effort: true,
            ranking: Some(RankingMode::IncrementalScore),
            timeout_seconds: Some(9),
        };
        let config = options.resolve_config().unwrap();
        assert_eq!(config.federation.shards, ["a", "b:6000"]);
        assert_eq!(config.federation.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(config.federation.ranking, RankingMode::IncrementalScore);
        assert_eq!(config.federation.timeout_seconds, 9);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::default().save_to_file(&path).unwrap();
        let options = SearchOptions {
            config: Some(path),
            timeout_seconds: Some(0),
            ..SearchOptions::default()
        };
        assert_eq!(options.resolve_config().unwrap_err().code(), 500);
    }

    #[tokio::test]
    async fn malformed_query_is_a_400_document() {
        let err = search(&AppConfig::default(), "?q=x").await.unwrap_err();
        assert_eq!(document(&err)["code"], 400);
    }

    #[tokio::test]
    async fn no_shards_emits_an_empty_page() {
        let mut config = AppConfig::default();
        config.federation.shards.clear();
        let bytes = search(&config, "/search/db/idx?q=x").await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"total_rows": 0, "rows": []}));
    }
}
