//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use nostr_kernel_core::{
    unix_now, Event, EventTemplate, Keypair, Kind, PublicKey, Rumor, Tag, Timestamp,
};
use nostr_kernel_crypto::{InternalSigner, SharedSecretCache};
use nostr_kernel_store::MemoryStore;

/// A test fixture with a keypair, its shared-secret cache and a memory store.
pub struct TestFixture {
    pub keypair: Keypair,
    pub cache: Arc<SharedSecretCache>,
    pub store: MemoryStore,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// Create with a deterministic keypair from a secret key.
    ///
    /// Panics if `seed` is not a valid secp256k1 secret key.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let keypair = Keypair::from_secret_bytes(&seed).expect("seed is a valid secret key");
        Self::from_keypair(keypair)
    }

    fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair,
            cache: Arc::new(SharedSecretCache::new()),
            store: MemoryStore::new(),
        }
    }

    /// Get the keypair's public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// A signer for this fixture that shares the fixture's cache.
    pub fn signer(&self) -> InternalSigner {
        InternalSigner::new(self.keypair.clone(), Arc::clone(&self.cache))
    }

    /// Sign an event of `kind` at `created_at`.
    pub fn make_event_at(
        &self,
        kind: Kind,
        content: &str,
        tags: Vec<Tag>,
        created_at: Timestamp,
    ) -> Event {
        EventTemplate::new(kind, content)
            .tags(tags)
            .created_at(created_at)
            .to_unsigned(self.public_key())
            .sign(&self.keypair)
            .expect("fixture key signs its own events")
    }

    /// Sign an event of `kind` created now.
    pub fn make_event(&self, kind: Kind, content: &str, tags: Vec<Tag>) -> Event {
        self.make_event_at(kind, content, tags, unix_now())
    }

    /// Create a kind 1 text note.
    pub fn make_note(&self, content: &str) -> Event {
        self.make_event(Kind::TEXT_NOTE, content, Vec::new())
    }

    /// Create a text note that expires at `expires_at`.
    pub fn make_expiring_note(&self, content: &str, expires_at: Timestamp) -> Event {
        self.make_event(
            Kind::TEXT_NOTE,
            content,
            vec![Tag::expiration(expires_at)],
        )
    }

    /// Create a kind 14 chat rumor addressed to `recipients`.
    pub fn make_chat_rumor(&self, content: &str, recipients: &[PublicKey]) -> Rumor {
        EventTemplate::new(Kind::PRIVATE_DIRECT_MESSAGE, content)
            .tags(recipients.iter().map(Tag::pubkey))
            .to_unsigned(self.public_key())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[24..].copy_from_slice(&(i as u64 + 1).to_be_bytes());
            TestFixture::with_seed(seed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_kernel_core::validate_event;
    use nostr_kernel_crypto::NostrSigner;
    use nostr_kernel_store::EventStore;

    #[tokio::test]
    async fn test_fixture_events_verify_and_store() {
        let fixture = TestFixture::new();
        let note = fixture.make_note("hello");

        assert!(validate_event(&note).is_ok());
        assert_eq!(*note.pubkey(), fixture.public_key());

        fixture.store.insert(&note).await.unwrap();
        assert!(fixture.store.get(note.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_signer_shares_cache() {
        let alice = TestFixture::new();
        let bob = TestFixture::new();

        let signer = alice.signer();
        assert_eq!(signer.pubkey(), alice.public_key());
        signer.nip44_encrypt("hi", &bob.public_key()).await.unwrap();
        assert_eq!(alice.cache.len(), 1);
    }

    #[test]
    fn test_chat_rumor_tags_recipients() {
        let parties = multi_party_fixtures(3);
        let rumor =
            parties[0].make_chat_rumor("hey", &[parties[1].public_key(), parties[2].public_key()]);
        assert_eq!(rumor.kind(), Kind::PRIVATE_DIRECT_MESSAGE);
        assert_eq!(
            rumor.tagged_pubkeys(),
            vec![parties[1].public_key(), parties[2].public_key()]
        );
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_fixtures(3);

        // Each party has unique keys
        let pks: Vec<_> = parties.iter().map(|p| p.public_key()).collect();
        assert_ne!(pks[0], pks[1]);
        assert_ne!(pks[1], pks[2]);
        assert_ne!(pks[0], pks[2]);

        // And the same keys every time
        assert_eq!(multi_party_fixtures(3)[2].public_key(), pks[2]);
    }
}
