//! HTTP shard client.
//!
//! Provides a configured [`reqwest::Client`] and [`HttpShardClient`], the
//! production [`ShardClient`]. Automatic decompression is switched off and
//! `Accept-Encoding: gzip` is requested explicitly, so that
//! [`inflate_or_raw`] decides how the body is decoded.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING};

use crate::config::FederationConfig;
use crate::decode::{inflate_or_raw, parse_partial};
use crate::error::{FederationError, Result};
use crate::shard::ShardClient;
use crate::types::{PartialResult, Query, ShardAddress};

/// User-Agent sent when the configuration names none.
pub const DEFAULT_USER_AGENT: &str = concat!("federate-search/", env!("CARGO_PKG_VERSION"));

/// Response headers dropped after the body has been decoded.
const STALE_AFTER_DECODE: &[&str] = &["content-encoding", "content-length", "transfer-encoding"];

/// Build a [`reqwest::Client`] configured for shard requests.
///
/// The client has:
/// - Timeout from config, covering connect, request, and body
/// - The configured User-Agent (or [`DEFAULT_USER_AGENT`])
/// - `Accept-Encoding: gzip` and no transparent decompression
///
/// # Errors
///
/// Returns [`FederationError::Config`] if the client cannot be constructed.
pub fn build_client(config: &FederationConfig) -> Result<reqwest::Client> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(ua)
        .default_headers(headers)
        .no_gzip()
        .build()
        .map_err(|e| FederationError::Config(format!("failed to build HTTP client: {e}")))
}

/// A shard response with its body already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase for `status`.
    pub reason: String,
    /// Response headers with capitalized names, minus encoding headers
    /// that no longer describe the decoded body.
    pub headers: Vec<(String, String)>,
    /// Decoded body bytes.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of the `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the body is declared as JSON.
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.contains("json"))
    }
}

/// Production [`ShardClient`] speaking HTTP.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpShardClient {
    client: reqwest::Client,
    forwarded: Vec<(String, String)>,
}

impl HttpShardClient {
    /// Create a client from the federation configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &FederationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            forwarded: Vec::new(),
        })
    }

    /// Forward these request headers (for example `Accept` or
    /// `If-None-Match` from the original caller) to every shard.
    pub fn with_forwarded_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.forwarded = headers;
        self
    }

    /// Issue `query` to `shard` and return the decoded response, whatever
    /// its status.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::ShardUnavailable`] on connect, timeout, or
    /// transport failure.
    pub async fn fetch_raw(&self, shard: &ShardAddress, query: &Query) -> Result<RawResponse> {
        let shard_id = shard.to_string();
        let url = query.url_for(shard)?;
        tracing::debug!(shard = %shard_id, %url, "querying shard");

        let mut request = self.client.get(url);
        for (name, value) in &self.forwarded {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => tracing::warn!(header = %name, "skipping unforwardable header"),
            }
        }

        let response = request.send().await.map_err(|e| transport_error(&shard_id, &e))?;

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !STALE_AFTER_DECODE.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (capitalize_header(name.as_str()), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&shard_id, &e))?;
        let body = inflate_or_raw(body.to_vec());

        tracing::trace!(
            shard = %shard_id,
            status = status.as_u16(),
            bytes = body.len(),
            "shard response received"
        );

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            headers,
            body,
        })
    }
}

impl ShardClient for HttpShardClient {
    async fn fetch(&self, shard: &ShardAddress, query: &Query) -> Result<PartialResult> {
        let shard_id = shard.to_string();
        let raw = self.fetch_raw(shard, query).await?;

        if !raw.is_success() {
            return Err(FederationError::ShardProtocol {
                shard: shard_id,
                status: Some(raw.status),
                reason: format!("HTTP {} {}", raw.status, raw.reason),
            });
        }

        parse_partial(&shard_id, &raw.body)
    }
}

fn transport_error(shard: &str, err: &reqwest::Error) -> FederationError {
    let reason = if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("request failed: {err}")
    };
    FederationError::unavailable(shard, reason)
}

/// `content-type` becomes `Content-Type`.
pub fn capitalize_header(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_client_with_default_config() {
        let client = build_client(&FederationConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn build_client_with_custom_ua() {
        let config = FederationConfig {
            user_agent: Some("CustomFederator/1.0".into()),
            ..Default::default()
        };
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn default_user_agent_names_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("federate-search/"));
    }

    #[test]
    fn capitalizes_header_names() {
        assert_eq!(capitalize_header("content-type"), "Content-Type");
        assert_eq!(capitalize_header("etag"), "Etag");
        assert_eq!(capitalize_header("x-request-ID"), "X-Request-Id");
    }

    #[test]
    fn raw_response_helpers() {
        let raw = RawResponse {
            status: 200,
            reason: "OK".into(),
            headers: vec![(
                "Content-Type".into(),
                "application/json; charset=utf-8".into(),
            )],
            body: b"{}".to_vec(),
        };
        assert!(raw.is_success());
        assert!(raw.is_json());
        assert_eq!(raw.content_type(), Some("application/json; charset=utf-8"));

        let not_found = RawResponse {
            status: 404,
            headers: vec![],
            ..raw
        };
        assert!(!not_found.is_success());
        assert!(!not_found.is_json());
    }
}
