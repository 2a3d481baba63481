//! Error types for the crypto module.

use std::time::Duration;

use nostr_kernel_core::{CoreError, Kind, PublicKey, ValidationError};
use thiserror::Error;

/// Errors from key agreement and the payload ciphers.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Secret key is zero or not below the curve order.
    #[error("invalid secret key")]
    InvalidSecretKey,

    /// Public key is not an x coordinate on secp256k1.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Plaintext exceeds the cipher's size limit.
    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),

    /// Any failure while decrypting. Deliberately carries no detail.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Encryption primitive failure.
    #[error("encryption error: {0}")]
    EncryptionError(String),
}

/// Errors from the signer capability.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The signer only knows a public key.
    #[error("signer is read-only")]
    ReadOnly,

    /// The remote signer refused the request.
    #[error("request rejected by signer: {0}")]
    Rejected(String),

    /// The remote signer went away or answered nonsense.
    #[error("remote signer error: {0}")]
    Remote(String),

    /// No answer within the caller's deadline.
    #[error("signer timed out after {0:?}")]
    Timeout(Duration),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl SignerError {
    /// True when the failure was a decryption failure.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, SignerError::Crypto(CryptoError::DecryptionFailed))
    }
}

/// Errors while sealing or unwrapping private messages.
#[derive(Debug, Error)]
pub enum WrapError {
    #[error("expected kind {expected}, got {got}")]
    UnexpectedKind { expected: Kind, got: Kind },

    #[error("gift wrap is addressed to {0}, not to this signer")]
    NotRecipient(PublicKey),

    #[error("seal signed by {seal} but rumor claims {rumor}")]
    AuthorMismatch { seal: PublicKey, rumor: PublicKey },

    #[error("invalid layer: {0}")]
    Invalid(#[from] ValidationError),

    #[error("malformed inner payload: {0}")]
    Malformed(#[from] CoreError),

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
}

/// Result type for cipher operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
