//! Error types for the FixDesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all FixDesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Knowledge store errors ---
    #[error("Knowledge store error: {0}")]
    Store(#[from] StoreError),

    // --- Turn errors ---
    #[error("Turn failed: {0}")]
    Turn(#[from] TurnError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Knowledge store / vector database errors.
///
/// `Connection` is the only variant that is fatal at construction time; a
/// missing collection degrades the store instead of failing it.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Failed to connect to vector database: {0}")]
    Connection(String),

    #[error("Collection '{0}' does not exist")]
    CollectionMissing(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Embedding has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector database request failed: {0}")]
    Request(String),

    #[error("Knowledge base unavailable: {0}")]
    Unavailable(String),
}

/// Failures recovered at the turn boundary.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error("Completion backend failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Proposed step repeats an earlier step: {0}")]
    RepeatedStep(String),

    #[error("Empty message")]
    EmptyInput,

    #[error("Unknown session: {0}")]
    UnknownSession(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn connection_error_is_distinct_from_missing_collection() {
        let conn = StoreError::Connection("refused".into());
        let missing = StoreError::CollectionMissing("device_solutions".into());
        assert!(conn.to_string().contains("connect"));
        assert!(missing.to_string().contains("device_solutions"));
        assert!(!matches!(missing, StoreError::Connection(_)));
    }

    #[test]
    fn turn_error_wraps_provider_error() {
        let err: TurnError = ProviderError::Network("reset by peer".into()).into();
        assert!(err.to_string().contains("reset by peer"));
    }
}
