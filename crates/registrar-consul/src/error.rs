//! Registry client error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors surfaced by registry clients and the reconciler.
///
/// None of these are retried here; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("registry returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("address resolution failed: {0}")]
    Resolution(String),

    #[error("invalid agent address: {0}")]
    InvalidAddress(String),
}
