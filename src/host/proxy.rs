//! Routes host requests to the shards.
//!
//! `info` requests, and every request when only one shard is configured,
//! are relayed verbatim to the first shard. Searches over two or more
//! shards are federated and answered with the merged page.

use federate_search::http::{HttpShardClient, RawResponse};
use federate_search::{emit, Coordinator, Query, ShardAddress};
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::error::{HookError, Result};
use crate::host::contract::{Command, HostRequest, HostResponse, RELAY_FAILURE_MESSAGE};

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forward to the first shard and pass its reply through.
    Relay,
    /// Fan out to every shard and merge.
    Federate,
}

/// Answers host requests against a fixed shard list.
pub struct SearchProxy {
    shards: Vec<ShardAddress>,
    client: HttpShardClient,
    coordinator: Coordinator<HttpShardClient>,
}

impl SearchProxy {
    /// Build a proxy for the configured shards.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration or shard address.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let shards = config.shard_addresses()?;
        let engine = config.federation_config();
        let client = HttpShardClient::new(&engine)?;
        let coordinator = Coordinator::new(client.clone(), engine)?;
        Ok(Self {
            shards,
            client,
            coordinator,
        })
    }

    /// Configured shards, in order.
    pub fn shards(&self) -> &[ShardAddress] {
        &self.shards
    }

    /// Pick the route for a request issuing `command`.
    pub fn route(&self, command: Command) -> Route {
        if command == Command::Info || self.shards.len() == 1 {
            Route::Relay
        } else {
            Route::Federate
        }
    }

    /// Answer one raw protocol line. Never fails: every problem becomes a
    /// `{code, body}` reply.
    pub async fn handle_line(&self, line: &str) -> HostResponse {
        tracing::info!(request = %line, "request from host");
        let response = match serde_json::from_str::<HostRequest>(line) {
            Ok(request) => self.handle(&request).await,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable host request");
                HostResponse::error(400, format!("invalid request: {e}"))
            }
        };
        tracing::info!(code = response.code, "response to host");
        response
    }

    /// Answer one parsed request.
    pub async fn handle(&self, request: &HostRequest) -> HostResponse {
        match self.try_handle(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, code = e.code(), "request failed");
                HostResponse::from(&e)
            }
        }
    }

    async fn try_handle(&self, request: &HostRequest) -> Result<HostResponse> {
        let query = request.to_query()?;
        let route = self.route(request.command());
        tracing::info!(query = %query, ?route, "search server query");

        match route {
            Route::Relay => {
                let shard = self
                    .shards
                    .first()
                    .ok_or_else(|| HookError::Config("no search servers configured".into()))?;
                Ok(self.relay(shard, &query, request.forwarded_headers()).await)
            }
            Route::Federate => self.federate(&query).await,
        }
    }

    async fn relay(
        &self,
        shard: &ShardAddress,
        query: &Query,
        forwarded: Vec<(String, String)>,
    ) -> HostResponse {
        let client = self.client.clone().with_forwarded_headers(forwarded);
        match client.fetch_raw(shard, query).await {
            Ok(raw) => {
                tracing::trace!(
                    %shard,
                    status = raw.status,
                    body = %String::from_utf8_lossy(&raw.body),
                    "search server response"
                );
                relayed(raw)
            }
            Err(e) => {
                tracing::error!(%shard, error = %e, "error sending request to search server");
                HostResponse::error(500, RELAY_FAILURE_MESSAGE)
            }
        }
    }

    async fn federate(&self, query: &Query) -> Result<HostResponse> {
        let merged = match self.coordinator.federate(&self.shards, query).await {
            Ok(merged) => merged,
            Err(e) => {
                tracing::warn!(error = %e, "federated search failed");
                return Ok(HostResponse::from(&e));
            }
        };

        let bytes = emit::emit(&merged)?;
        let json: Value = serde_json::from_slice(&bytes)
            .map_err(|e| HookError::Config(format!("merged result is not JSON: {e}")))?;

        let mut headers = Map::new();
        headers.insert("Content-Type".into(), Value::from("application/json"));
        Ok(HostResponse::json(200, headers, json))
    }
}

/// Turn a shard reply into a host reply.
fn relayed(raw: RawResponse) -> HostResponse {
    if !raw.is_success() {
        return HostResponse::error(raw.status, raw.reason);
    }

    let headers: Map<String, Value> = raw
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
        .collect();

    if raw.is_json() {
        if let Ok(json) = serde_json::from_slice::<Value>(&raw.body) {
            return HostResponse::json(raw.status, headers, json);
        }
    }
    HostResponse::text(
        raw.status,
        headers,
        String::from_utf8_lossy(&raw.body).into_owned(),
    )
}
