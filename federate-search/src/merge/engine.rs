//! Rank-preserving merge of partial results.
//!
//! The merge is pure and infallible: given well-formed partial results it
//! always produces a [`MergedResult`]. All failure handling belongs to the
//! coordinator.

use std::cmp::Ordering;

use crate::types::{Hit, MergedResult, PartialResult};

use super::ranking::{RankingMode, RankingPolicy};

/// Merge partial results with the default [`RankingMode::SortKey`] strategy.
///
/// # Pipeline
///
/// 1. Sum every shard's `total_rows`
/// 2. Pick the ranking policy: sort keys if any shard reports a sort
///    directive, otherwise document identifiers
/// 3. Concatenate all hits in shard order, stamping each with its shard
/// 4. Stable sort by the policy, so equal keys keep shard order
/// 5. Truncate to `page_size`
pub fn merge(partials: Vec<PartialResult>, page_size: usize) -> MergedResult {
    merge_with(partials, page_size, RankingMode::SortKey)
}

/// Merge partial results with an explicit [`RankingMode`].
pub fn merge_with(partials: Vec<PartialResult>, page_size: usize, mode: RankingMode) -> MergedResult {
    let total_rows = partials
        .iter()
        .fold(0u64, |acc, p| acc.saturating_add(p.total_rows));
    let policy = RankingPolicy::select(mode, &partials);

    let rows = match mode {
        RankingMode::SortKey => sort_then_truncate(partials, page_size, &policy),
        RankingMode::IncrementalScore => fold_pairwise(partials, page_size, &policy),
    };

    tracing::trace!(total_rows, rows = rows.len(), page_size, ?mode, "merged partial results");

    MergedResult {
        total_rows,
        rows,
        failed_shards: Vec::new(),
    }
}

/// Page size to merge with: the requested size, lowered to the smallest
/// page any shard reports having honoured.
pub fn effective_page_size(requested: usize, partials: &[PartialResult]) -> usize {
    partials
        .iter()
        .filter_map(|p| p.limit)
        .fold(requested, usize::min)
}

fn stamped_hits(partial: PartialResult) -> impl Iterator<Item = Hit> {
    let shard = partial.shard;
    partial
        .hits
        .into_iter()
        .map(move |hit| hit.with_shard(shard.clone()))
}

fn sort_then_truncate(partials: Vec<PartialResult>, page_size: usize, policy: &RankingPolicy) -> Vec<Hit> {
    let mut rows: Vec<Hit> = partials.into_iter().flat_map(stamped_hits).collect();
    rows.sort_by(|a, b| policy.compare(a, b));
    rows.truncate(page_size);
    rows
}

/// Each shard's page is ordered on its own, then merged into the running
/// page with a linear two-way merge.
fn fold_pairwise(partials: Vec<PartialResult>, page_size: usize, policy: &RankingPolicy) -> Vec<Hit> {
    partials.into_iter().fold(Vec::new(), |accumulated, partial| {
        let mut incoming: Vec<Hit> = stamped_hits(partial).collect();
        incoming.sort_by(|a, b| policy.compare(a, b));
        merge_sorted(accumulated, incoming, page_size, policy)
    })
}

/// Merge two sorted runs, keeping at most `limit` hits. On equal keys the
/// left (earlier) run wins.
fn merge_sorted(left: Vec<Hit>, right: Vec<Hit>, limit: usize, policy: &RankingPolicy) -> Vec<Hit> {
    let mut merged = Vec::with_capacity(limit.min(left.len() + right.len()));
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    while merged.len() < limit {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => policy.compare(l, r) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        match next {
            Some(hit) => merged.push(hit),
            None => break,
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortField;
    use serde_json::json;

    fn partial(shard: &str, total: u64, hits: &[(&str, Option<f64>)]) -> PartialResult {
        PartialResult::new(
            shard,
            total,
            hits.iter().map(|(id, score)| Hit::new(*id, *score)).collect(),
        )
    }

    fn ids(result: &MergedResult) -> Vec<&str> {
        result.rows.iter().map(Hit::id).collect()
    }

    #[test]
    fn falls_back_to_identifier_order() {
        let a = partial("A", 2, &[("a", Some(0.9)), ("b", Some(0.5))]);
        let b = partial("B", 1, &[("c", Some(0.7))]);
        let merged = merge(vec![a, b], 2);
        assert_eq!(merged.total_rows, 3);
        assert_eq!(ids(&merged), ["a", "b"]);
    }

    #[test]
    fn total_rows_saturates_instead_of_wrapping() {
        let a = partial("A", u64::MAX, &[("a", Some(0.9))]);
        let b = partial("B", 1, &[("b", Some(0.5))]);
        let merged = merge(vec![a, b], 10);
        assert_eq!(merged.total_rows, u64::MAX);
        assert_eq!(merged.rows.len(), 2);
    }

    #[test]
    fn zero_shards_is_empty_not_error() {
        let merged = merge(vec![], 10);
        assert_eq!(merged, MergedResult::default());
    }

    #[test]
    fn zero_page_size_keeps_total() {
        let merged = merge(vec![partial("A", 7, &[("a", None), ("b", None)])], 0);
        assert_eq!(merged.total_rows, 7);
        assert!(merged.rows.is_empty());
    }

    #[test]
    fn shard_with_total_but_no_hits_only_counts() {
        let a = partial("A", 1, &[("a", None)]);
        let b = partial("B", 40, &[]);
        let merged = merge(vec![a, b], 10);
        assert_eq!(merged.total_rows, 41);
        assert_eq!(ids(&merged), ["a"]);
    }

    #[test]
    fn hits_are_stamped_with_their_shard() {
        let a = partial("db1:5985", 1, &[("x", None)]);
        let b = partial("db2:5985", 1, &[("y", None)]);
        let merged = merge(vec![a, b], 10);
        assert_eq!(merged.rows[0].shard(), Some("db1:5985"));
        assert_eq!(merged.rows[1].shard(), Some("db2:5985"));
    }

    #[test]
    fn colliding_identifiers_are_kept_in_shard_order() {
        let a = partial("A", 1, &[("same", Some(0.1))]);
        let b = partial("B", 1, &[("same", Some(0.9))]);
        let merged = merge(vec![a, b], 10);
        assert_eq!(merged.rows.len(), 2);
        assert_eq!(merged.rows[0].shard(), Some("A"));
        assert_eq!(merged.rows[1].shard(), Some("B"));
    }

    #[test]
    fn sort_order_on_any_shard_ranks_by_keys() {
        let a = PartialResult::new(
            "A",
            2,
            vec![
                Hit::new("z", None).with_sort_key(vec![json!(1)]),
                Hit::new("y", None).with_sort_key(vec![json!(4)]),
            ],
        )
        .with_sort_order(vec![SortField::default()]);
        let b = PartialResult::new(
            "B",
            2,
            vec![
                Hit::new("a", None).with_sort_key(vec![json!(2)]),
                Hit::new("b", None).with_sort_key(vec![json!(3)]),
            ],
        );
        let merged = merge(vec![a, b], 3);
        assert_eq!(ids(&merged), ["z", "a", "b"]);
    }

    #[test]
    fn reversed_sort_directive_is_honoured() {
        let column = SortField {
            field: "date".into(),
            reverse: true,
            kind: "long".into(),
        };
        let a = PartialResult::new(
            "A",
            1,
            vec![Hit::new("old", None).with_sort_key(vec![json!(100)])],
        )
        .with_sort_order(vec![column.clone()]);
        let b = PartialResult::new(
            "B",
            1,
            vec![Hit::new("new", None).with_sort_key(vec![json!(300)])],
        )
        .with_sort_order(vec![column]);
        let merged = merge(vec![a, b], 2);
        assert_eq!(ids(&merged), ["new", "old"]);
    }

    #[test]
    fn remerging_own_output_is_idempotent() {
        let a = partial("A", 3, &[("d", None), ("a", None), ("f", None)]);
        let b = partial("B", 2, &[("c", None), ("b", None)]);
        let first = merge(vec![a, b], 3);
        let again = merge(
            vec![PartialResult::new("merged", first.total_rows, first.rows.clone())],
            3,
        );
        assert_eq!(again, first);
    }

    #[test]
    fn effective_page_size_takes_smallest_limit() {
        let partials = vec![
            partial("A", 0, &[]).with_limit(25),
            partial("B", 0, &[]).with_limit(10),
            partial("C", 0, &[]),
        ];
        assert_eq!(effective_page_size(25, &partials), 10);
        assert_eq!(effective_page_size(5, &partials), 5);
        assert_eq!(effective_page_size(8, &[]), 8);
    }

    #[test]
    fn incremental_mode_ranks_by_score_then_identifier_descending() {
        let a = partial("A", 3, &[("a", Some(0.9)), ("b", Some(0.5)), ("e", Some(0.3))]);
        let b = partial("B", 2, &[("c", Some(0.7)), ("d", Some(0.5))]);
        let merged = merge_with(vec![a, b], 4, RankingMode::IncrementalScore);
        assert_eq!(merged.total_rows, 5);
        assert_eq!(ids(&merged), ["a", "c", "d", "b"]);
    }

    #[test]
    fn incremental_mode_sorts_unsorted_shard_pages() {
        let a = partial("A", 2, &[("low", Some(0.1)), ("high", Some(0.8))]);
        let merged = merge_with(vec![a], 10, RankingMode::IncrementalScore);
        assert_eq!(ids(&merged), ["high", "low"]);
    }

    #[test]
    fn incremental_mode_truncates_after_every_fold() {
        let shards: Vec<PartialResult> = (0..4)
            .map(|i| {
                let hits: Vec<(String, Option<f64>)> = (0..5)
                    .map(|j| (format!("s{i}-{j}"), Some(f64::from(i * 10 + j))))
                    .collect();
                PartialResult::new(
                    format!("S{i}"),
                    5,
                    hits.iter().map(|(id, s)| Hit::new(id.as_str(), *s)).collect(),
                )
            })
            .collect();
        let merged = merge_with(shards, 3, RankingMode::IncrementalScore);
        assert_eq!(merged.total_rows, 20);
        assert_eq!(ids(&merged), ["s3-4", "s3-3", "s3-2"]);
    }

    #[test]
    fn incremental_ties_prefer_earlier_shard() {
        let a = partial("A", 1, &[("same", Some(0.5))]);
        let b = partial("B", 1, &[("same", Some(0.5))]);
        let merged = merge_with(vec![a, b], 2, RankingMode::IncrementalScore);
        assert_eq!(merged.rows[0].shard(), Some("A"));
        assert_eq!(merged.rows[1].shard(), Some("B"));
    }
}
