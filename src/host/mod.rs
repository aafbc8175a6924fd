//! External-process adapter between a database host and the search shards.

pub mod contract;
pub mod proxy;
pub mod stdio;

pub use contract::{Command, HostRequest, HostResponse};
pub use proxy::{Route, SearchProxy};
