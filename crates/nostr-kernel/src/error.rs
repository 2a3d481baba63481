//! Error types for the facade.

use std::time::Duration;

use nostr_kernel_core::{CoreError, ValidationError};
use nostr_kernel_crypto::{CryptoError, SignerError, WrapError};
use nostr_kernel_relay::RelayError;
use nostr_kernel_store::StoreError;
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed event or key material.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Cipher error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Signer error.
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    /// Seal or gift wrap error.
    #[error("gift wrap error: {0}")]
    Wrap(#[from] WrapError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Relay error.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// The signer did not answer in time.
    #[error("signer timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, KernelError>;
