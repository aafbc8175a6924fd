//! Federation configuration with sensible defaults.
//!
//! [`FederationConfig`] is passed explicitly into the coordinator when it is
//! constructed; nothing in this crate reads process-global settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FederationError;
use crate::merge::RankingMode;

/// What the coordinator does when some shards fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any shard failure fails the whole request.
    #[default]
    FailFast,
    /// Merge whatever succeeded and report the failed shards alongside.
    /// The total is then a lower bound.
    BestEffort,
}

/// Configuration for federated search requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Page size used when the query carries no `limit`.
    pub default_limit: usize,
    /// Per-shard timeout in seconds, covering connect, request, and body.
    pub timeout_seconds: u64,
    /// Failure handling across shards.
    pub failure_policy: FailurePolicy,
    /// How hits from different shards are ranked against each other.
    pub ranking: RankingMode,
    /// Custom User-Agent for shard requests.
    pub user_agent: Option<String>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            default_limit: 25,
            timeout_seconds: 5,
            failure_policy: FailurePolicy::FailFast,
            ranking: RankingMode::SortKey,
            user_agent: None,
        }
    }
}

impl FederationConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `default_limit` must be greater than 0
    /// - `timeout_seconds` must be greater than 0
    pub fn validate(&self) -> Result<(), FederationError> {
        if self.default_limit == 0 {
            return Err(FederationError::Config(
                "default_limit must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(FederationError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Per-shard timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
