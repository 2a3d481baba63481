//! The signer capability.
//!
//! Anything that can act for a public key implements [`NostrSigner`]: sign
//! templates and run the NIP-04 / NIP-44 ciphers against peers. Implementations
//! in this crate:
//! - [`InternalSigner`]: holds the secret key, uses an owned shared-secret cache
//! - [`ReadOnlySigner`]: knows only the public key, refuses everything
//! - [`RemoteSigner`](crate::remote::RemoteSigner): forwards to another task

use async_trait::async_trait;
use std::sync::Arc;

use nostr_kernel_core::{Event, EventTemplate, Keypair, PublicKey};

use crate::ecdh::SharedSecretCache;
use crate::envelope::PayloadFormat;
use crate::error::SignerError;
use crate::nip04;
use crate::nip44::{self, ConversationKey};

/// Result type for signer operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;

/// Capability to sign and encrypt on behalf of one public key.
#[async_trait]
pub trait NostrSigner: Send + Sync {
    /// The public key this signer acts for.
    fn pubkey(&self) -> PublicKey;

    /// Whether the signer can produce signatures and decrypt.
    fn is_writeable(&self) -> bool;

    /// Bind the template to [`pubkey`](Self::pubkey), hash and sign it.
    async fn sign(&self, template: &EventTemplate) -> SignerResult<Event>;

    async fn nip44_encrypt(&self, plaintext: &str, peer: &PublicKey) -> SignerResult<String>;

    async fn nip44_decrypt(&self, payload: &str, peer: &PublicKey) -> SignerResult<String>;

    async fn nip04_encrypt(&self, plaintext: &str, peer: &PublicKey) -> SignerResult<String>;

    async fn nip04_decrypt(&self, content: &str, peer: &PublicKey) -> SignerResult<String>;

    /// Decrypt content in either format, picking the cipher from its shape.
    async fn decrypt_auto(&self, content: &str, peer: &PublicKey) -> SignerResult<String> {
        match PayloadFormat::detect(content) {
            PayloadFormat::Nip04 => self.nip04_decrypt(content, peer).await,
            PayloadFormat::Nip44 => self.nip44_decrypt(content, peer).await,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal signer
// ─────────────────────────────────────────────────────────────────────────────

/// A signer that holds the secret key in process.
pub struct InternalSigner {
    keypair: Keypair,
    cache: Arc<SharedSecretCache>,
}

impl InternalSigner {
    /// Create a signer that memoizes ECDH results in `cache`.
    pub fn new(keypair: Keypair, cache: Arc<SharedSecretCache>) -> Self {
        Self { keypair, cache }
    }

    /// Create a signer with a private cache.
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self::new(keypair, Arc::new(SharedSecretCache::new()))
    }

    /// The cache this signer writes into.
    pub fn cache(&self) -> &Arc<SharedSecretCache> {
        &self.cache
    }

    fn conversation_key(&self, peer: &PublicKey) -> SignerResult<ConversationKey> {
        let secret = self.cache.get_or_compute(&self.keypair, peer)?;
        Ok(ConversationKey::from_shared_secret(&secret))
    }
}

impl std::fmt::Debug for InternalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalSigner")
            .field("pubkey", &self.keypair.public_key())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NostrSigner for InternalSigner {
    fn pubkey(&self) -> PublicKey {
        self.keypair.public_key()
    }

    fn is_writeable(&self) -> bool {
        true
    }

    async fn sign(&self, template: &EventTemplate) -> SignerResult<Event> {
        let rumor = template.to_unsigned(self.keypair.public_key());
        Ok(rumor.sign(&self.keypair)?)
    }

    async fn nip44_encrypt(&self, plaintext: &str, peer: &PublicKey) -> SignerResult<String> {
        Ok(nip44::encrypt(&self.conversation_key(peer)?, plaintext)?)
    }

    async fn nip44_decrypt(&self, payload: &str, peer: &PublicKey) -> SignerResult<String> {
        Ok(nip44::decrypt(&self.conversation_key(peer)?, payload)?)
    }

    async fn nip04_encrypt(&self, plaintext: &str, peer: &PublicKey) -> SignerResult<String> {
        let secret = self.cache.get_or_compute(&self.keypair, peer)?;
        Ok(nip04::encrypt(&secret, plaintext)?)
    }

    async fn nip04_decrypt(&self, content: &str, peer: &PublicKey) -> SignerResult<String> {
        let secret = self.cache.get_or_compute(&self.keypair, peer)?;
        Ok(nip04::decrypt(&secret, content)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Read-only signer
// ─────────────────────────────────────────────────────────────────────────────

/// A signer that only knows a public key. Every private operation fails with
/// [`SignerError::ReadOnly`].
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlySigner {
    pubkey: PublicKey,
}

impl ReadOnlySigner {
    pub fn new(pubkey: PublicKey) -> Self {
        Self { pubkey }
    }
}

#[async_trait]
impl NostrSigner for ReadOnlySigner {
    fn pubkey(&self) -> PublicKey {
        self.pubkey
    }

    fn is_writeable(&self) -> bool {
        false
    }

    async fn sign(&self, _template: &EventTemplate) -> SignerResult<Event> {
        Err(SignerError::ReadOnly)
    }

    async fn nip44_encrypt(&self, _plaintext: &str, _peer: &PublicKey) -> SignerResult<String> {
        Err(SignerError::ReadOnly)
    }

    async fn nip44_decrypt(&self, _payload: &str, _peer: &PublicKey) -> SignerResult<String> {
        Err(SignerError::ReadOnly)
    }

    async fn nip04_encrypt(&self, _plaintext: &str, _peer: &PublicKey) -> SignerResult<String> {
        Err(SignerError::ReadOnly)
    }

    async fn nip04_decrypt(&self, _content: &str, _peer: &PublicKey) -> SignerResult<String> {
        Err(SignerError::ReadOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;
    use nostr_kernel_core::{validate_event, Kind, Tag};

    #[tokio::test]
    async fn test_internal_signer_signs_valid_events() {
        let signer = InternalSigner::from_keypair(Keypair::generate());
        let template = EventTemplate::new(Kind::TEXT_NOTE, "signed").tag(Tag::from_parts(["t", "x"]));

        let event = signer.sign(&template).await.unwrap();
        assert_eq!(*event.pubkey(), signer.pubkey());
        assert!(validate_event(&event).is_ok());
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_between_signers() {
        let alice = InternalSigner::from_keypair(Keypair::generate());
        let bob = InternalSigner::from_keypair(Keypair::generate());

        let c44 = alice.nip44_encrypt("hi bob", &bob.pubkey()).await.unwrap();
        assert_eq!(bob.nip44_decrypt(&c44, &alice.pubkey()).await.unwrap(), "hi bob");

        let c04 = alice.nip04_encrypt("hi bob", &bob.pubkey()).await.unwrap();
        assert_eq!(bob.nip04_decrypt(&c04, &alice.pubkey()).await.unwrap(), "hi bob");

        assert_eq!(bob.decrypt_auto(&c44, &alice.pubkey()).await.unwrap(), "hi bob");
        assert_eq!(bob.decrypt_auto(&c04, &alice.pubkey()).await.unwrap(), "hi bob");
    }

    #[tokio::test]
    async fn test_shared_cache_is_populated() {
        let cache = Arc::new(SharedSecretCache::new());
        let alice = InternalSigner::new(Keypair::generate(), cache.clone());
        let bob = Keypair::generate().public_key();

        alice.nip44_encrypt("a", &bob).await.unwrap();
        alice.nip04_encrypt("b", &bob).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_peer_fails_closed() {
        let alice = InternalSigner::from_keypair(Keypair::generate());
        let bob = InternalSigner::from_keypair(Keypair::generate());
        let eve = Keypair::generate().public_key();

        let payload = alice.nip44_encrypt("secret", &bob.pubkey()).await.unwrap();
        let err = bob.nip44_decrypt(&payload, &eve).await.unwrap_err();
        assert!(err.is_decryption_failure());
        assert!(matches!(
            err,
            SignerError::Crypto(CryptoError::DecryptionFailed)
        ));
    }

    #[tokio::test]
    async fn test_read_only_signer_refuses() {
        let signer = ReadOnlySigner::new(Keypair::generate().public_key());
        let peer = Keypair::generate().public_key();
        assert!(!signer.is_writeable());

        let template = EventTemplate::new(Kind::TEXT_NOTE, "nope");
        assert!(matches!(signer.sign(&template).await, Err(SignerError::ReadOnly)));
        assert!(matches!(
            signer.nip44_encrypt("x", &peer).await,
            Err(SignerError::ReadOnly)
        ));
        assert!(matches!(
            signer.decrypt_auto("abc?iv=def", &peer).await,
            Err(SignerError::ReadOnly)
        ));
    }
}
