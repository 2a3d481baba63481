//! Encrypted payload envelopes.
//!
//! Event content that holds ciphertext comes in two shapes:
//! - NIP-44: `base64(version || nonce[32] || ciphertext || mac[32])`
//! - NIP-04: `base64(ciphertext)?iv=base64(iv)`
//!
//! This module frames and unframes the NIP-44 layout and tells the two
//! formats apart. Every framing failure is reported as
//! [`CryptoError::DecryptionFailed`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{CryptoError, Result};

/// The only NIP-44 version this crate speaks.
pub const NIP44_VERSION: u8 = 2;

const NONCE_LEN: usize = 32;
const MAC_LEN: usize = 32;

/// Smallest raw payload: version, nonce, 2-byte prefix + 32 padded, mac.
pub const MIN_PAYLOAD_LEN: usize = 1 + NONCE_LEN + 2 + 32 + MAC_LEN;
/// Largest raw payload: padded length of a 65535-byte plaintext.
pub const MAX_PAYLOAD_LEN: usize = 1 + NONCE_LEN + 2 + 65536 + MAC_LEN;

const MIN_ENCODED_LEN: usize = 132;
const MAX_ENCODED_LEN: usize = 87472;

/// Which cipher produced a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Legacy AES-256-CBC.
    Nip04,
    /// Versioned ChaCha20 + HMAC-SHA256.
    Nip44,
}

impl PayloadFormat {
    /// Tell the formats apart by the NIP-04 `?iv=` marker.
    pub fn detect(content: &str) -> Self {
        if content.contains("?iv=") {
            PayloadFormat::Nip04
        } else {
            PayloadFormat::Nip44
        }
    }
}

/// A framed NIP-44 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nip44Payload {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub mac: [u8; MAC_LEN],
}

impl Nip44Payload {
    /// The bytes covered by the MAC: `nonce || ciphertext`.
    pub fn authenticated_parts(&self) -> [&[u8]; 2] {
        [&self.nonce, &self.ciphertext]
    }

    /// Frame and base64-encode.
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(1 + NONCE_LEN + self.ciphertext.len() + MAC_LEN);
        raw.push(NIP44_VERSION);
        raw.extend_from_slice(&self.nonce);
        raw.extend_from_slice(&self.ciphertext);
        raw.extend_from_slice(&self.mac);
        BASE64.encode(raw)
    }

    /// Base64-decode and unframe.
    ///
    /// Rejects the `#` prefix reserved for future non-base64 versions, any
    /// version byte other than 2, and payloads outside the size bounds.
    pub fn decode(payload: &str) -> Result<Self> {
        if payload.starts_with('#') {
            tracing::trace!("nip44 payload uses an unsupported encoding");
            return Err(CryptoError::DecryptionFailed);
        }
        if !(MIN_ENCODED_LEN..=MAX_ENCODED_LEN).contains(&payload.len()) {
            return Err(CryptoError::DecryptionFailed);
        }

        let raw = BASE64
            .decode(payload)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        if !(MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN).contains(&raw.len()) {
            return Err(CryptoError::DecryptionFailed);
        }
        if raw[0] != NIP44_VERSION {
            tracing::trace!(version = raw[0], "nip44 payload has unknown version");
            return Err(CryptoError::DecryptionFailed);
        }

        let mac_start = raw.len() - MAC_LEN;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&raw[1..1 + NONCE_LEN]);
        let mut mac = [0u8; MAC_LEN];
        mac.copy_from_slice(&raw[mac_start..]);

        Ok(Self {
            nonce,
            ciphertext: raw[1 + NONCE_LEN..mac_start].to_vec(),
            mac,
        })
    }
}
