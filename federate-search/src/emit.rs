//! Response emitter: serializes merged results and failures.
//!
//! Pure serialization. Row members are written in the order the shard sent
//! them, followed by the originating shard.

use serde::{Deserialize, Serialize};

use crate::error::{FederationError, Result};
use crate::types::MergedResult;

/// Structured failure reported to callers in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Numeric status code.
    pub code: u16,
    /// Human-readable message.
    pub body: String,
}

impl From<&FederationError> for ErrorBody {
    fn from(err: &FederationError) -> Self {
        Self {
            code: err.code(),
            body: err.to_string(),
        }
    }
}

/// Serialize a merged result as a compact JSON object.
///
/// # Errors
///
/// Returns [`FederationError::Emit`] if serialization fails.
pub fn emit(result: &MergedResult) -> Result<Vec<u8>> {
    serde_json::to_vec(result).map_err(|e| FederationError::Emit(e.to_string()))
}

/// Written when an [`ErrorBody`] itself cannot be serialized.
const FALLBACK_ERROR: &[u8] = br#"{"code":500,"body":"internal error"}"#;

/// Serialize a failure as `{"code": .., "body": ..}`.
pub fn emit_error(err: &FederationError) -> Vec<u8> {
    emit_error_body(&ErrorBody::from(err))
}

/// Serialize an already-built [`ErrorBody`].
pub fn emit_error_body(body: &ErrorBody) -> Vec<u8> {
    serde_json::to_vec(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize error body");
        FALLBACK_ERROR.to_vec()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hit;
    use serde_json::{json, Value};

    #[test]
    fn emits_total_and_rows() {
        let merged = MergedResult {
            total_rows: 3,
            rows: vec![
                Hit::new("a", Some(0.9)).with_shard("s1:5985"),
                Hit::new("b", Some(0.5)).with_shard("s1:5985"),
            ],
            failed_shards: vec![],
        };
        let value: Value = serde_json::from_slice(&emit(&merged).expect("emit")).expect("json");
        assert_eq!(
            value,
            json!({
                "total_rows": 3,
                "rows": [
                    {"_id": "a", "score": 0.9, "server": "s1:5985"},
                    {"_id": "b", "score": 0.5, "server": "s1:5985"}
                ]
            })
        );
    }

    #[test]
    fn emits_empty_result() {
        let bytes = emit(&MergedResult::default()).expect("emit");
        assert_eq!(bytes, br#"{"total_rows":0,"rows":[]}"#);
    }

    #[test]
    fn best_effort_failures_are_listed() {
        let merged = MergedResult {
            total_rows: 0,
            rows: vec![],
            failed_shards: vec!["down:5985".into()],
        };
        let value: Value = serde_json::from_slice(&emit(&merged).expect("emit")).expect("json");
        assert_eq!(value["failed_shards"], json!(["down:5985"]));
    }

    #[test]
    fn opaque_fields_pass_through_in_order() {
        let row: Hit = serde_json::from_str(
            r#"{"_id":"d","fields":{"z":1,"a":[1,2]},"highlights":{"body":["<em>x</em>"]},"doc":{"_rev":"1-x"}}"#,
        )
        .expect("row");
        let merged = MergedResult {
            total_rows: 1,
            rows: vec![row.with_shard("s")],
            failed_shards: vec![],
        };
        let json = String::from_utf8(emit(&merged).expect("emit")).expect("utf8");
        assert_eq!(
            json,
            r#"{"total_rows":1,"rows":[{"_id":"d","fields":{"z":1,"a":[1,2]},"highlights":{"body":["<em>x</em>"]},"doc":{"_rev":"1-x"},"server":"s"}]}"#
        );
    }

    #[test]
    fn error_body_carries_code_and_message() {
        let err = FederationError::ShardUnavailable {
            shard: "db1:5985".into(),
            reason: "connection refused".into(),
        };
        let value: Value = serde_json::from_slice(&emit_error(&err)).expect("json");
        assert_eq!(value["code"], 503);
        assert_eq!(value["body"], "shard db1:5985 unavailable: connection refused");
    }

    #[test]
    fn error_body_from_invalid_query() {
        let body = ErrorBody::from(&FederationError::InvalidQuery("missing q".into()));
        assert_eq!(body.code, 400);
        assert!(body.body.contains("missing q"));
    }

    #[test]
    fn error_body_is_written_code_first_and_escaped() {
        let err = FederationError::InvalidQuery("bad \"q\"".into());
        let bytes = emit_error(&err);
        let json = String::from_utf8(bytes.clone()).expect("utf8");
        assert!(json.starts_with(r#"{"code":400,"body":"#));
        let body: ErrorBody = serde_json::from_slice(&bytes).expect("round trip");
        assert_eq!(body, ErrorBody::from(&err));
    }
}
