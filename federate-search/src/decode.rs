//! Shard response body decoding.
//!
//! Bodies may arrive gzip-compressed. Inflation is attempted first and the
//! raw bytes are used unchanged when that fails, so a missing or garbled
//! envelope never fails a request on its own. Only a body that is not a
//! search response after both attempts is a protocol error.

use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::{Map, Value};

use crate::error::{FederationError, Result};
use crate::types::{Hit, PartialResult, SortField};

/// Inflate a gzip body, falling back to the raw bytes.
pub fn inflate_or_raw(body: Vec<u8>) -> Vec<u8> {
    if body.is_empty() {
        return body;
    }
    let mut inflated = Vec::new();
    match GzDecoder::new(body.as_slice()).read_to_end(&mut inflated) {
        Ok(_) => {
            tracing::trace!(
                compressed = body.len(),
                inflated = inflated.len(),
                "inflated gzip body"
            );
            inflated
        }
        Err(e) => {
            tracing::trace!(error = %e, "body is not gzip; using it as-is");
            body
        }
    }
}

/// Parse a decoded shard body into a [`PartialResult`].
///
/// # Errors
///
/// Returns [`FederationError::ShardProtocol`] if the body is not JSON, is
/// not a single response object, lacks `total_rows` or `rows`, or contains
/// a row without an identifier.
pub fn parse_partial(shard: &str, body: &[u8]) -> Result<PartialResult> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| FederationError::protocol(shard, format!("body is not JSON: {e}")))?;

    let object = match value {
        Value::Object(object) => object,
        Value::Array(_) => {
            return Err(FederationError::protocol(
                shard,
                "multi-query responses cannot be federated",
            ))
        }
        other => {
            return Err(FederationError::protocol(
                shard,
                format!("expected a JSON object, got {}", type_name(&other)),
            ))
        }
    };

    let total_rows = object
        .get("total_rows")
        .and_then(Value::as_u64)
        .ok_or_else(|| FederationError::protocol(shard, "missing or invalid total_rows"))?;

    let rows = match object.get("rows") {
        Some(Value::Array(rows)) => rows,
        _ => return Err(FederationError::protocol(shard, "missing or invalid rows")),
    };

    let hits = rows
        .iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(fields) => Hit::from_row(fields.clone())
                .map_err(|reason| FederationError::protocol(shard, format!("row {index}: {reason}"))),
            other => Err(FederationError::protocol(
                shard,
                format!("row {index} is {}, not an object", type_name(other)),
            )),
        })
        .collect::<Result<Vec<Hit>>>()?;

    // A shard cannot match fewer rows than it returned.
    let reported = total_rows;
    let total_rows = reported.max(hits.len() as u64);
    if total_rows != reported {
        tracing::debug!(shard, reported, rows = hits.len(), "total_rows below row count, raised");
    }

    Ok(PartialResult {
        shard: shard.to_string(),
        total_rows,
        hits,
        sort_order: object.get("sort_order").map(parse_sort_fields),
        limit: read_usize(&object, "limit"),
        skip: object.get("skip").and_then(Value::as_u64),
    })
}

/// Read the top-level sort directive leniently.
///
/// Malformed columns become plain ascending columns so that column
/// positions still line up with the per-row key values.
fn parse_sort_fields(value: &Value) -> Vec<SortField> {
    match value {
        Value::Array(columns) => columns
            .iter()
            .map(|column| match column {
                Value::String(name) => SortField {
                    field: name.clone(),
                    ..SortField::default()
                },
                other => serde_json::from_value(other.clone()).unwrap_or_default(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn read_usize(object: &Map<String, Value>, key: &str) -> Option<usize> {
    object
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
