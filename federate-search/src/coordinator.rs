//! Federation coordinator: concurrent shard fan-out, join, merge.
//!
//! Every shard query runs as its own tokio task and returns an independent
//! [`PartialResult`]. Nothing is shared between tasks. The coordinator
//! awaits every task before it looks at any outcome, so the merge always
//! sees all shards in configured order regardless of completion order.
//!
//! # Request lifecycle
//!
//! ```text
//! Dispatched ──► AwaitingAllShards ──► Merging ──► Emitted
//!                       │
//!                       └──► Failed
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::config::{FailurePolicy, FederationConfig};
use crate::emit::emit;
use crate::error::{FederationError, Result};
use crate::http::HttpShardClient;
use crate::merge::{effective_page_size, merge_with};
use crate::shard::ShardClient;
use crate::types::{MergedResult, PartialResult, Query, ShardAddress};

/// Lifecycle state of one federated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Shard tasks have been spawned.
    Dispatched,
    /// Waiting at the join barrier for every shard task.
    AwaitingAllShards,
    /// All shards answered; partial results are being merged.
    Merging,
    /// The merged result has been serialized for the caller.
    Emitted,
    /// The request failed; any shard output is discarded.
    Failed,
}

impl RequestState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: RequestState) -> bool {
        matches!(
            (self, next),
            (Self::Dispatched, Self::AwaitingAllShards)
                | (Self::AwaitingAllShards, Self::Merging)
                | (Self::AwaitingAllShards, Self::Failed)
                | (Self::Merging, Self::Emitted)
        )
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Emitted | Self::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dispatched => "dispatched",
            Self::AwaitingAllShards => "awaiting_all_shards",
            Self::Merging => "merging",
            Self::Emitted => "emitted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracking handle for one federated request.
#[derive(Debug, Clone)]
pub struct FederatedRequest {
    id: Uuid,
    state: RequestState,
}

impl FederatedRequest {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RequestState::Dispatched,
        }
    }

    /// Unique id of this request, as recorded in its tracing span.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RequestState {
        self.state
    }

    fn advance(&mut self, next: RequestState) {
        if self.state.can_transition_to(next) {
            tracing::debug!(request_id = %self.id, from = %self.state, to = %next, "request state");
            self.state = next;
        } else {
            tracing::error!(
                request_id = %self.id,
                from = %self.state,
                to = %next,
                "illegal request state transition ignored"
            );
        }
    }

    /// Serialize the merged result for the caller and mark the request
    /// emitted.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Emit`] if serialization fails.
    pub fn emit(&mut self, merged: &MergedResult) -> Result<Vec<u8>> {
        let bytes = emit(merged)?;
        self.advance(RequestState::Emitted);
        Ok(bytes)
    }
}

/// Fans one query out to many shards and merges the answers.
///
/// Configuration is fixed at construction. The client is shared by all
/// shard tasks.
pub struct Coordinator<C> {
    client: Arc<C>,
    config: FederationConfig,
}

impl Coordinator<HttpShardClient> {
    /// Coordinator backed by the production HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Config`] if the configuration is invalid
    /// or the HTTP client cannot be built.
    pub fn http(config: FederationConfig) -> Result<Self> {
        let client = HttpShardClient::new(&config)?;
        Self::new(client, config)
    }
}

impl<C: ShardClient + 'static> Coordinator<C> {
    /// Create a coordinator around `client`.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Config`] if the configuration is invalid.
    pub fn new(client: C, config: FederationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// The configuration this coordinator was built with.
    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// Federate `query` across `shards` and return the merged page.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::FailFast`], the failure of the first failing
    /// shard in configured order. Under [`FailurePolicy::BestEffort`],
    /// [`FederationError::AllShardsFailed`] when no shard succeeded.
    pub async fn federate(&self, shards: &[ShardAddress], query: &Query) -> Result<MergedResult> {
        self.dispatch(shards, query).await.1
    }

    /// Federate and serialize in one step.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::federate`], plus [`FederationError::Emit`].
    pub async fn federate_and_emit(&self, shards: &[ShardAddress], query: &Query) -> Result<Vec<u8>> {
        let (mut request, merged) = self.dispatch(shards, query).await;
        request.emit(&merged?)
    }

    /// Federate `query` and also return the request's tracking handle.
    pub async fn dispatch(
        &self,
        shards: &[ShardAddress],
        query: &Query,
    ) -> (FederatedRequest, Result<MergedResult>) {
        let mut request = FederatedRequest::new();
        let span = tracing::info_span!("federate", request_id = %request.id, shards = shards.len());
        let result = self.run(&mut request, shards, query).instrument(span).await;
        (request, result)
    }

    async fn run(
        &self,
        request: &mut FederatedRequest,
        shards: &[ShardAddress],
        query: &Query,
    ) -> Result<MergedResult> {
        tracing::info!(query = %query, "dispatching federated query");

        let outcomes = self.gather(request, shards, query).await;

        let mut partials: Vec<PartialResult> = Vec::with_capacity(outcomes.len());
        let mut failures: Vec<FederationError> = Vec::new();
        for (shard, outcome) in shards.iter().zip(outcomes) {
            match outcome {
                Ok(partial) => {
                    tracing::debug!(
                        %shard,
                        total_rows = partial.total_rows,
                        hits = partial.hits.len(),
                        "shard returned results"
                    );
                    partials.push(partial);
                }
                Err(err) => {
                    tracing::warn!(%shard, error = %err, "shard query failed");
                    failures.push(err);
                }
            }
        }

        match self.config.failure_policy {
            FailurePolicy::FailFast => {
                if let Some(first) = failures.into_iter().next() {
                    request.advance(RequestState::Failed);
                    return Err(first);
                }
                request.advance(RequestState::Merging);
                Ok(self.merge(partials, query, Vec::new()))
            }
            FailurePolicy::BestEffort => {
                if partials.is_empty() && !failures.is_empty() {
                    request.advance(RequestState::Failed);
                    let reasons: Vec<String> = failures.iter().map(ToString::to_string).collect();
                    return Err(FederationError::AllShardsFailed(reasons.join("; ")));
                }
                request.advance(RequestState::Merging);
                let failed = failures
                    .iter()
                    .filter_map(|e| e.shard().map(str::to_string))
                    .collect();
                Ok(self.merge(partials, query, failed))
            }
        }
    }

    /// Spawn one task per shard and wait for all of them.
    ///
    /// Outcomes are returned in shard order. A task that panics counts as
    /// an unavailable shard.
    async fn gather(
        &self,
        request: &mut FederatedRequest,
        shards: &[ShardAddress],
        query: &Query,
    ) -> Vec<Result<PartialResult>> {
        let query = Arc::new(query.clone());
        let timeout = self.config.timeout();

        let handles: Vec<_> = shards
            .iter()
            .map(|shard| {
                let client = Arc::clone(&self.client);
                let query = Arc::clone(&query);
                let shard = shard.clone();
                tokio::spawn(
                    async move { fetch_with_timeout(client.as_ref(), &shard, &query, timeout).await }
                        .in_current_span(),
                )
            })
            .collect();

        request.advance(RequestState::AwaitingAllShards);

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, shard) in handles.into_iter().zip(shards) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(FederationError::unavailable(
                    shard.to_string(),
                    format!("shard task failed: {e}"),
                )),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    fn merge(&self, partials: Vec<PartialResult>, query: &Query, failed: Vec<String>) -> MergedResult {
        let requested = query.limit().unwrap_or(self.config.default_limit);
        let page_size = effective_page_size(requested, &partials);
        let mut merged = merge_with(partials, page_size, self.config.ranking);
        merged.failed_shards = failed;
        tracing::info!(
            total_rows = merged.total_rows,
            rows = merged.rows.len(),
            page_size,
            "federated query merged"
        );
        merged
    }
}

async fn fetch_with_timeout<C: ShardClient>(
    client: &C,
    shard: &ShardAddress,
    query: &Query,
    timeout: Duration,
) -> Result<PartialResult> {
    match tokio::time::timeout(timeout, client.fetch(shard, query)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(FederationError::unavailable(
            shard.to_string(),
            format!("timed out after {}s", timeout.as_secs()),
        )),
    }
}
