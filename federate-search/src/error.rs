//! Error types for the federate-search crate.
//!
//! Every variant maps to a numeric status code via [`FederationError::code`]
//! so that adapters can turn any failure into a `{code, body}` object
//! without inspecting the message text.

/// Errors that can occur while federating a search across shards.
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    /// A shard could not be reached: connection refused, DNS failure,
    /// transport error, or per-shard timeout.
    #[error("shard {shard} unavailable: {reason}")]
    ShardUnavailable {
        /// Identifier of the shard that failed.
        shard: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A shard answered, but with an error status or a body that is not a
    /// well-formed search response.
    #[error("shard {shard} protocol error: {reason}")]
    ShardProtocol {
        /// Identifier of the shard that failed.
        shard: String,
        /// Upstream HTTP status, when the failure was a non-2xx response.
        status: Option<u16>,
        /// Human-readable failure reason.
        reason: String,
    },

    /// The incoming request could not be turned into a shard query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Best-effort mode only: not a single shard succeeded.
    #[error("all shards failed: {0}")]
    AllShardsFailed(String),

    /// Invalid federation configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The merged result could not be serialized.
    #[error("emit error: {0}")]
    Emit(String),
}

impl FederationError {
    /// Numeric status code reported to callers for this failure.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidQuery(_) => 400,
            Self::ShardUnavailable { .. } | Self::AllShardsFailed(_) => 503,
            Self::ShardProtocol {
                status: Some(status),
                ..
            } if *status >= 400 => *status,
            Self::ShardProtocol { .. } => 502,
            Self::Config(_) | Self::Emit(_) => 500,
        }
    }

    /// Identifier of the shard responsible for this failure, if any.
    pub fn shard(&self) -> Option<&str> {
        match self {
            Self::ShardUnavailable { shard, .. } | Self::ShardProtocol { shard, .. } => {
                Some(shard)
            }
            _ => None,
        }
    }

    pub(crate) fn unavailable(shard: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ShardUnavailable {
            shard: shard.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol(shard: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ShardProtocol {
            shard: shard.into(),
            status: None,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for federate-search results.
pub type Result<T> = std::result::Result<T, FederationError>;
