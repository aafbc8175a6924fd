//! Error types for the search hook and CLI.

use federate_search::FederationError;

/// Top-level error type for the host adapter and CLI front ends.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// The host sent a request that cannot be turned into a shard query.
    #[error("{0}")]
    InvalidRequest(String),

    /// Configuration file, override, or shard list problem.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error on the protocol channel or a local file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Federation failure reported by the engine.
    #[error(transparent)]
    Federation(#[from] FederationError),
}

impl HookError {
    /// Numeric status code reported to the host for this failure.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Config(_) | Self::Io(_) => 500,
            Self::Federation(e) => e.code(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_message_is_bare() {
        let err = HookError::InvalidRequest("No query found in request.".into());
        assert_eq!(err.to_string(), "No query found in request.");
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn federation_errors_keep_their_code() {
        let err = HookError::from(FederationError::AllShardsFailed("a; b".into()));
        assert_eq!(err.code(), 503);
        assert_eq!(err.to_string(), "all shards failed: a; b");
    }

    #[test]
    fn io_errors_are_internal() {
        let err = HookError::from(std::io::Error::other("pipe closed"));
        assert_eq!(err.code(), 500);
        assert!(err.to_string().contains("pipe closed"));
    }
}
