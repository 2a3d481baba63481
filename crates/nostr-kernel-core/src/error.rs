//! Error types for the Nostr kernel core.

use thiserror::Error;

use crate::types::EventId;

/// Core errors that can occur while decoding keys, ids and events.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed signature: expected 64 bytes, got {0}")]
    MalformedSignature(usize),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validation errors for event identity and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("event id mismatch: claimed {claimed}, computed {computed}")]
    IdMismatch { claimed: EventId, computed: EventId },

    #[error("signature verification failed")]
    SignatureFailed,

    #[error("event is unsigned")]
    Unsigned,

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidPublicKey | CoreError::MalformedSignature(_) => {
                ValidationError::SignatureFailed
            }
            other => ValidationError::StructuralError(other.to_string()),
        }
    }
}
