//! Trait definition for shard clients.
//!
//! The coordinator talks to shards only through [`ShardClient`], so the
//! HTTP implementation in [`crate::http`] can be swapped for in-process
//! fakes in tests.

use crate::error::FederationError;
use crate::types::{PartialResult, Query, ShardAddress};

/// Issues one query to one shard.
///
/// Implementations perform no retries. Failures are classified as
/// [`FederationError::ShardUnavailable`] (the shard could not be reached)
/// or [`FederationError::ShardProtocol`] (it answered with an error status
/// or a malformed body).
///
/// All implementations must be `Send + Sync`: the coordinator runs one
/// fetch per shard on its own task.
pub trait ShardClient: Send + Sync {
    /// Fetch one shard's page of results for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError`] if the shard is unreachable or its
    /// response is not a valid search result.
    fn fetch(
        &self,
        shard: &ShardAddress,
        query: &Query,
    ) -> impl std::future::Future<Output = Result<PartialResult, FederationError>> + Send;
}
