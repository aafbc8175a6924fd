//! lucene-federate: federated full-text search for couchdb-lucene shards.
//!
//! Two front ends share this library:
//!
//! - **`lucene-federate`**: runs one query across a shard list and prints
//!   the merged page
//! - **`lucene-federate-hook`**: the external-process hook a database host
//!   launches; it relays `info` and single-shard requests and federates
//!   multi-shard searches
//!
//! The scatter-gather engine itself lives in [`federate_search`].

pub mod config;
pub mod paths;
pub mod error;
pub mod host;
pub mod logging;
pub mod oneshot;

pub use config::{AppConfig, FederationSection, LogConfig};
pub use error::{HookError, Result};
pub use host::{HostRequest, HostResponse, SearchProxy};
