//! Wire types of the external-process protocol spoken with the database host.
//!
//! The host writes one [`HostRequest`] per line and expects exactly one
//! [`HostResponse`] line back.

use federate_search::{FederationError, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HookError, Result};

/// Request headers forwarded to a shard when relaying.
pub const FORWARDED_HEADERS: &[&str] = &["Accept", "If-None-Match"];

/// Body of the reply when a relayed request cannot reach its shard.
pub const RELAY_FAILURE_MESSAGE: &str = "Unexpected error when sending request to the search server.";

/// Shard endpoint a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run a query (`q` present).
    Search,
    /// Describe the index.
    Info,
}

impl Command {
    /// Render command name as the first path segment.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Info => "info",
        }
    }
}

/// One request from the host.
///
/// `path` is the request path split into segments:
/// `[database, handler, design doc, view, ...]`. Fields the host sends that
/// are not listed here are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostRequest {
    pub path: Vec<String>,
    pub query: Option<Map<String, Value>>,
    pub headers: Map<String, Value>,
}

impl HostRequest {
    /// `search` when the query has `q`, else `info`.
    pub fn command(&self) -> Command {
        match &self.query {
            Some(query) if query.contains_key("q") => Command::Search,
            _ => Command::Info,
        }
    }

    /// Build the shard query for this request.
    ///
    /// The collection is `/{command}/{database}/{design doc}/{view}` and
    /// every query member becomes a parameter, in the order the host sent
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidRequest`] when the query object is
    /// missing or the path is too short.
    pub fn to_query(&self) -> Result<Query> {
        let params = self
            .query
            .as_ref()
            .ok_or_else(|| HookError::InvalidRequest("No query found in request.".into()))?;

        let (database, design_doc, view) = match self.path.as_slice() {
            [database, _, design_doc, view, ..] => (database, design_doc, view),
            _ => {
                return Err(HookError::InvalidRequest(
                    "Path must contain database name, design doc name, and view name.".into(),
                ))
            }
        };

        let collection = format!(
            "/{}/{database}/{design_doc}/{view}",
            self.command().as_str()
        );
        Ok(params
            .iter()
            .fold(Query::new(collection), |query, (name, value)| {
                query.with_param(name, param_text(value))
            }))
    }

    /// The subset of [`FORWARDED_HEADERS`] present on this request, matched
    /// case-insensitively.
    pub fn forwarded_headers(&self) -> Vec<(String, String)> {
        FORWARDED_HEADERS
            .iter()
            .filter_map(|wanted| {
                self.headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                    .map(|(_, value)| ((*wanted).to_string(), param_text(value)))
            })
            .collect()
    }
}

/// Strings verbatim, anything else as JSON text.
fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One reply to the host.
///
/// Successful replies carry `headers` and either `json` (a parsed JSON
/// body) or `body` (text). Failures carry only `code` and a `body` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostResponse {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HostResponse {
    /// A reply carrying a JSON document.
    #[must_use]
    pub fn json(code: u16, headers: Map<String, Value>, json: Value) -> Self {
        Self {
            code,
            headers: Some(headers),
            json: Some(json),
            body: None,
        }
    }

    /// A reply carrying a text body.
    #[must_use]
    pub fn text(code: u16, headers: Map<String, Value>, body: impl Into<String>) -> Self {
        Self {
            code,
            headers: Some(headers),
            json: None,
            body: Some(body.into()),
        }
    }

    /// A `{code, body}` failure reply.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            headers: None,
            json: None,
            body: Some(message.into()),
        }
    }

    /// Whether this reply reports a failure.
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }
}

impl From<&HookError> for HostResponse {
    fn from(err: &HookError) -> Self {
        Self::error(err.code(), err.to_string())
    }
}

impl From<&FederationError> for HostResponse {
    fn from(err: &FederationError) -> Self {
        Self::error(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    fn request(value: Value) -> HostRequest {
        serde_json::from_value(value).expect("request")
    }

    #[test]
    fn query_with_q_is_a_search() {
        let req = request(json!({
            "path": ["enron", "_fti", "mail", "by_content"],
            "query": {"q": "content:enron", "limit": "10", "include_docs": true}
        }));
        assert_eq!(req.command(), Command::Search);

        let query = req.to_query().unwrap();
        assert_eq!(query.collection(), "/search/enron/mail/by_content");
        assert_eq!(
            query.params(),
            [
                ("q".to_string(), "content:enron".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("include_docs".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn query_without_q_is_info() {
        let req = request(json!({
            "path": ["enron", "_fti", "mail", "by_content"],
            "query": {}
        }));
        assert_eq!(req.command(), Command::Info);
        assert_eq!(req.to_query().unwrap().to_string(), "/info/enron/mail/by_content");
    }

    #[test]
    fn missing_query_is_rejected_first() {
        let req = request(json!({"path": ["enron"]}));
        let err = req.to_query().unwrap_err();
        assert_eq!(err.to_string(), "No query found in request.");
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn short_path_is_rejected() {
        let req = request(json!({"path": ["enron", "_fti", "mail"], "query": {"q": "x"}}));
        let err = req.to_query().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Path must contain database name, design doc name, and view name."
        );
    }

    #[test]
    fn unknown_request_fields_are_ignored() {
        let req = request(json!({
            "info": {"db_name": "enron"},
            "verb": "GET",
            "path": ["a", "b", "c", "d"],
            "query": {"q": "x"},
            "headers": {"Host": "localhost:5984"}
        }));
        assert_eq!(req.path.len(), 4);
    }

    #[test]
    fn only_selected_headers_are_forwarded() {
        let req = request(json!({
            "headers": {
                "accept": "application/json",
                "If-None-Match": "\"abc\"",
                "Cookie": "secret"
            }
        }));
        assert_eq!(
            req.forwarded_headers(),
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("If-None-Match".to_string(), "\"abc\"".to_string()),
            ]
        );
    }

    #[test]
    fn error_response_has_only_code_and_body() {
        let resp = HostResponse::error(400, "No query found in request.");
        assert!(resp.is_error());
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"code": 400, "body": "No query found in request."})
        );
    }

    #[test]
    fn json_response_serializes_headers_and_json() {
        let mut headers = Map::new();
        headers.insert("Content-Type".into(), json!("application/json"));
        let resp = HostResponse::json(200, headers, json!({"total_rows": 0}));
        assert!(!resp.is_error());
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"code":200,"headers":{"Content-Type":"application/json"},"json":{"total_rows":0}}"#
        );
    }
}
