//! Ranking policies: total orders over hits from different shards.
//!
//! Policy is chosen per merge. If any shard reports an explicit sort
//! directive, hits are ordered by their sort keys; otherwise by document
//! identifier. The score-descending order is only used when
//! [`RankingMode::IncrementalScore`] is configured.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Hit, PartialResult, SortField};

/// Configured merge strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    /// Concatenate every shard's hits, sort once, truncate.
    #[default]
    SortKey,
    /// Fold shards pairwise by score (descending) with identifier
    /// (descending) as tie-break, truncating after each fold.
    IncrementalScore,
}

/// A total order over [`Hit`] for one merge.
#[derive(Debug, Clone, PartialEq)]
pub enum RankingPolicy {
    /// Explicit per-row sort keys, column by column.
    SortKey(Vec<SortField>),
    /// Document identifier, ascending.
    Identifier,
    /// Score descending, then identifier descending.
    ScoreDescending,
}

impl RankingPolicy {
    /// Pick the policy for merging `partials` under `mode`.
    ///
    /// In [`RankingMode::SortKey`] the first shard that reports a sort
    /// directive supplies the column descriptors.
    pub fn select(mode: RankingMode, partials: &[PartialResult]) -> Self {
        match mode {
            RankingMode::IncrementalScore => Self::ScoreDescending,
            RankingMode::SortKey => partials
                .iter()
                .find_map(|p| p.sort_order.clone())
                .map_or(Self::Identifier, Self::SortKey),
        }
    }

    /// Compare two hits under this policy.
    pub fn compare(&self, a: &Hit, b: &Hit) -> Ordering {
        match self {
            Self::SortKey(columns) => compare_sort_keys(a.sort_key(), b.sort_key(), columns),
            Self::Identifier => a.id().cmp(b.id()),
            Self::ScoreDescending => compare_scores_descending(a.score(), b.score())
                .then_with(|| b.id().cmp(a.id())),
        }
    }
}

/// Rows with a key rank before rows without one.
fn compare_sort_keys(a: Option<&[Value]>, b: Option<&[Value]>, columns: &[SortField]) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            for (index, (x, y)) in a.iter().zip(b).enumerate() {
                let ordering = compare_values(x, y);
                let ordering = match columns.get(index) {
                    Some(column) if column.is_descending() => ordering.reverse(),
                    _ => ordering,
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Missing scores rank after present ones.
fn compare_scores_descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Total order over JSON values.
///
/// `null < false < true < numbers < strings < arrays < objects`. Numbers
/// compare by value, strings by bytes, arrays element-wise and then by
/// length, objects member-wise in their stored order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(p, q)| compare_values(p, q))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((kp, vp), (kq, vq))| kp.cmp(kq).then_with(|| compare_values(vp, vq)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Ordering {
    match (exact_integer(x), exact_integer(y)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(a), None) => compare_integer_float(a, y.as_f64().unwrap_or(f64::NAN)),
        (None, Some(b)) => compare_integer_float(b, x.as_f64().unwrap_or(f64::NAN)).reverse(),
        (None, None) => compare_floats(x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN)),
    }
}

fn exact_integer(n: &serde_json::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Zeroes compare equal so that `0`, `0.0` and `-0.0` stay one class.
fn compare_floats(x: f64, y: f64) -> Ordering {
    if x == y {
        Ordering::Equal
    } else {
        x.total_cmp(&y)
    }
}

/// Exact comparison of an integer with a float, without rounding the
/// integer through `f64`.
fn compare_integer_float(int: i128, float: f64) -> Ordering {
    // 2^127, the first float past the i128 range.
    const BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;
    if float.is_nan() {
        return Ordering::Less;
    }
    if float >= BOUND {
        return Ordering::Less;
    }
    if float < -BOUND {
        return Ordering::Greater;
    }
    let floor = float.floor();
    // In range and integral, so the cast is exact.
    match int.cmp(&(floor as i128)) {
        Ordering::Equal if float > floor => Ordering::Less,
        other => other,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
