//! secp256k1 key agreement and the shared-secret cache.
//!
//! The shared secret is the x coordinate of `secret * peer`, where the peer's
//! x-only key is lifted to the point with even y. It is used unhashed: as HKDF
//! input keying material for NIP-44 and directly as the AES key for NIP-04.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use nostr_kernel_core::{Keypair, PublicKey};

use crate::error::{CryptoError, Result};

/// A 32-byte ECDH shared secret.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Compute the ECDH shared secret between a secret key and a peer's x-only
/// public key.
pub fn shared_secret(secret: &[u8; 32], peer: &PublicKey) -> Result<SharedSecret> {
    let secret_key =
        k256::SecretKey::from_slice(secret).map_err(|_| CryptoError::InvalidSecretKey)?;

    let mut sec1 = [0u8; 33];
    sec1[0] = 0x02;
    sec1[1..].copy_from_slice(peer.as_bytes());
    let peer_point =
        k256::PublicKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::InvalidPublicKey)?;

    let shared = k256::ecdh::diffie_hellman(secret_key.to_nonzero_scalar(), peer_point.as_affine());

    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes());
    Ok(SharedSecret(out))
}

/// Memoized shared secrets, keyed by `(own public key, peer public key)`.
///
/// ECDH output never changes for a fixed pair, so entries are only ever
/// added; [`clear`](Self::clear) drops everything at logout. Safe to share
/// between threads behind an `Arc`.
#[derive(Default)]
pub struct SharedSecretCache {
    entries: RwLock<HashMap<(PublicKey, PublicKey), SharedSecret>>,
}

impl SharedSecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached secret for this pair, computing it on first use.
    pub fn get_or_compute(&self, keypair: &Keypair, peer: &PublicKey) -> Result<SharedSecret> {
        let key = (keypair.public_key(), *peer);

        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(secret) = entries.get(&key) {
                return Ok(*secret);
            }
        }

        let secret = shared_secret(&keypair.secret_bytes(), peer)?;

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Ok(*entries.entry(key).or_insert(secret))
    }

    /// Number of cached pairs.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached secret.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl fmt::Debug for SharedSecretCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecretCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_shared_secret_is_symmetric() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let ab = shared_secret(&alice.secret_bytes(), &bob.public_key()).unwrap();
        let ba = shared_secret(&bob.secret_bytes(), &alice.public_key()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_invalid_peer_rejected() {
        let alice = Keypair::generate();
        // Above the field prime, so not a coordinate at all.
        let result = shared_secret(&alice.secret_bytes(), &PublicKey::from_bytes([0xff; 32]));
        assert!(matches!(result, Err(CryptoError::InvalidPublicKey)));
    }

    #[test]
    fn test_zero_secret_rejected() {
        let bob = Keypair::generate();
        let result = shared_secret(&[0u8; 32], &bob.public_key());
        assert!(matches!(result, Err(CryptoError::InvalidSecretKey)));
    }

    #[test]
    fn test_cache_memoizes_and_clears() {
        let cache = SharedSecretCache::new();
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let first = cache.get_or_compute(&alice, &bob.public_key()).unwrap();
        let second = cache.get_or_compute(&alice, &bob.public_key()).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        cache.get_or_compute(&bob, &alice.public_key()).unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_concurrent_access() {
        let cache = Arc::new(SharedSecretCache::new());
        let alice = Keypair::generate();
        let peers: Vec<PublicKey> = (0..8).map(|_| Keypair::generate().public_key()).collect();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let alice = alice.clone();
                let peers = peers.clone();
                std::thread::spawn(move || {
                    peers
                        .iter()
                        .map(|p| cache.get_or_compute(&alice, p).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<SharedSecret>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(cache.len(), peers.len());
    }

    #[test]
    fn test_debug_redacts() {
        let secret = SharedSecret::from_bytes([0xaa; 32]);
        assert!(!format!("{:?}", secret).contains("aa"));
    }
}
