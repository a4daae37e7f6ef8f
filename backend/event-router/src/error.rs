use resilience::CircuitBreakerError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("zstd error: {0}")]
    Zstd(#[from] std::io::Error),

    #[error("compressed_data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload has no compressed_data field")]
    MissingCompressedData,

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Event bus publish failures
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize event detail: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event bus request failed: {0}")]
    Api(String),

    #[error("{failed} entries still failing after {attempts} attempts: {last_error}")]
    FailedEntries {
        failed: usize,
        attempts: u32,
        last_error: String,
    },

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a cross-region publish did not land
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl From<CircuitBreakerError<PublishError>> for TransportError {
    fn from(err: CircuitBreakerError<PublishError>) -> Self {
        match err {
            CircuitBreakerError::Open => TransportError::CircuitOpen,
            CircuitBreakerError::CallFailed(e) => TransportError::Publish(e),
        }
    }
}
