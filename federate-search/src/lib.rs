//! # federate-search
//!
//! Scatter-gather federation of full-text search queries across
//! independent shard servers.
//!
//! Every shard exposes the same paginated, ranked search endpoint. This
//! crate sends one query to all of them concurrently, waits for every
//! answer, and merges the partial pages into one globally ranked page.
//!
//! ## Design
//!
//! - [`http::HttpShardClient`] fetches one shard's page and decodes its
//!   (optionally gzipped) JSON body into a [`PartialResult`]
//! - [`merge`] sums totals, ranks hits by one total order, and truncates
//! - [`Coordinator`] runs one task per shard, joins them all, and applies
//!   the configured [`FailurePolicy`] before merging
//! - [`emit`] serializes the merged page or a `{code, body}` failure
//!
//! Shard tasks never share mutable state: each returns its own
//! [`PartialResult`], and results are only combined after the join.

pub mod config;
pub mod coordinator;
pub mod decode;
pub mod emit;
pub mod error;
pub mod http;
pub mod merge;
pub mod shard;
pub mod types;

pub use config::{FailurePolicy, FederationConfig};
pub use coordinator::{Coordinator, FederatedRequest, RequestState};
pub use error::{FederationError, Result};
pub use merge::{RankingMode, RankingPolicy};
pub use shard::ShardClient;
pub use types::{Hit, MergedResult, PartialResult, Query, ShardAddress, SortField};

/// Federate `query` across `shards` over HTTP.
///
/// Builds a one-off [`Coordinator`] from `config`. Callers issuing many
/// requests should keep a coordinator around instead, so the connection
/// pool is reused.
///
/// # Errors
///
/// Returns [`FederationError::Config`] for an invalid configuration, and
/// otherwise whatever [`Coordinator::federate`] returns.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> federate_search::Result<()> {
/// let shards: Vec<federate_search::ShardAddress> =
///     vec!["search-1:5985".parse()?, "search-2:5985".parse()?];
/// let query = federate_search::Query::parse("/search/enron/_design/mail?q=content:enron")?;
/// let config = federate_search::FederationConfig::default();
/// let merged = federate_search::federate(&shards, &query, &config).await?;
/// println!("{} matches", merged.total_rows);
/// # Ok(())
/// # }
/// ```
pub async fn federate(
    shards: &[ShardAddress],
    query: &Query,
    config: &FederationConfig,
) -> Result<MergedResult> {
    Coordinator::http(config.clone())?
        .federate(shards, query)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn federate_validates_config_zero_timeout() {
        let config = FederationConfig {
            timeout_seconds: 0,
            ..Default::default()
        };
        let result = federate(&[], &Query::new("/s"), &config).await;
        assert!(result.unwrap_err().to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn federate_validates_config_zero_limit() {
        let config = FederationConfig {
            default_limit: 0,
            ..Default::default()
        };
        let result = federate(&[], &Query::new("/s"), &config).await;
        assert!(result.unwrap_err().to_string().contains("default_limit"));
    }

    #[tokio::test]
    async fn federate_with_no_shards_is_empty() {
        let merged = federate(&[], &Query::new("/s"), &FederationConfig::default())
            .await
            .expect("merged");
        assert_eq!(merged.total_rows, 0);
        assert!(merged.rows.is_empty());
    }
}
