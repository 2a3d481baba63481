//! Error types for the relay module.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to a relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A frame is not a well-formed relay message or command.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Frame JSON did not parse.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection is closed.
    #[error("connection closed")]
    Closed,

    /// Timeout waiting for the relay.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// An event from the relay failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] nostr_kernel_core::ValidationError),

    /// The signer could not answer an AUTH challenge.
    #[error("signer error: {0}")]
    Signer(#[from] nostr_kernel_crypto::SignerError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] nostr_kernel_store::StoreError),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
