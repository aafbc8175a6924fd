//! Merge engine: ranking policies and the rank-preserving merge.
//!
//! Combines any number of per-shard partial results into one globally
//! ranked page. Totals are summed across shards, hits are ordered by a
//! single total order chosen per merge, and the page is truncated to the
//! caller's page size.

pub mod engine;
pub mod ranking;

pub use engine::{effective_page_size, merge, merge_with};
pub use ranking::{compare_values, RankingMode, RankingPolicy};
