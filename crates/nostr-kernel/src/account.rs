//! The Account: one identity with its signer, shared-secret cache and store.
//!
//! The account owns the ECDH cache its signer writes into, so the cache lives
//! exactly as long as the login and is cleared by [`Account::logout`].

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use nostr_kernel_core::{
    unix_now, validate_event, Event, EventId, EventTemplate, Filter, Keypair, Kind, PublicKey,
    Rumor, Tag, Timestamp,
};
use nostr_kernel_crypto::{giftwrap, InternalSigner, NostrSigner, SharedSecretCache};
use nostr_kernel_relay::{FetchReport, RelaySession, RelayTransport};
use nostr_kernel_store::{EventStore, InsertResult, StoreError};

use crate::error::{KernelError, Result};

/// Configuration for an account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Whether to check id and signature of ingested events.
    pub verify_on_ingest: bool,
    /// Whether opened private messages are kept in the account's inbox.
    pub store_unwrapped_rumors: bool,
    /// Expiration added to outgoing seals and gift wraps.
    pub gift_wrap_expiration: Option<Duration>,
    /// Deadline for each signer call.
    pub signer_timeout: Duration,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            verify_on_ingest: true,
            store_unwrapped_rumors: true,
            gift_wrap_expiration: None,
            signer_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of ingesting an event.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Event was stored.
    Stored(EventId),
    /// Event was already in store (idempotent).
    Duplicate,
    /// The store refused it (ephemeral or expired).
    Rejected(String),
    /// Id or signature did not check out.
    Invalid(String),
    /// A gift wrap for this account was stored and opened.
    PrivateMessage { wrap_id: EventId, rumor: Rumor },
}

#[derive(Default)]
struct Inbox {
    /// Gift wraps already tried, opened or not.
    attempted: HashSet<EventId>,
    rumors: HashMap<EventId, Rumor>,
}

/// One logged-in identity.
pub struct Account<S: EventStore> {
    signer: Arc<dyn NostrSigner>,
    store: Arc<S>,
    cache: Arc<SharedSecretCache>,
    config: AccountConfig,
    inbox: RwLock<Inbox>,
}

impl<S: EventStore> Account<S> {
    /// Create an account around an existing signer. `cache` should be the
    /// cache that signer computes shared secrets into.
    pub fn new(
        signer: Arc<dyn NostrSigner>,
        store: Arc<S>,
        cache: Arc<SharedSecretCache>,
        config: AccountConfig,
    ) -> Self {
        Self {
            signer,
            store,
            cache,
            config,
            inbox: RwLock::new(Inbox::default()),
        }
    }

    /// Create an account that holds its secret key in process.
    pub fn from_keypair(keypair: Keypair, store: Arc<S>, config: AccountConfig) -> Self {
        let cache = Arc::new(SharedSecretCache::new());
        let signer = Arc::new(InternalSigner::new(keypair, Arc::clone(&cache)));
        Self::new(signer, store, cache, config)
    }

    pub fn pubkey(&self) -> PublicKey {
        self.signer.pubkey()
    }

    pub fn is_writeable(&self) -> bool {
        self.signer.is_writeable()
    }

    pub fn signer(&self) -> &Arc<dyn NostrSigner> {
        &self.signer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &SharedSecretCache {
        &self.cache
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    fn inbox(&self) -> RwLockReadGuard<'_, Inbox> {
        self.inbox.read().unwrap_or_else(|e| e.into_inner())
    }

    fn inbox_mut(&self) -> RwLockWriteGuard<'_, Inbox> {
        self.inbox.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a signer call under the configured deadline.
    async fn bounded<T, E>(&self, call: impl Future<Output = std::result::Result<T, E>>) -> Result<T>
    where
        KernelError: From<E>,
    {
        let limit = self.config.signer_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(?limit, "signer call timed out");
                Err(KernelError::Timeout(limit))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Publishing
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign a template as this account.
    pub async fn sign(&self, template: &EventTemplate) -> Result<Event> {
        self.bounded(self.signer.sign(template)).await
    }

    /// Sign a template and keep the event locally.
    ///
    /// Store rejections (ephemeral kinds, already expired) are returned as
    /// errors after signing.
    pub async fn sign_and_store(&self, template: &EventTemplate) -> Result<Event> {
        let event = self.sign(template).await?;
        self.store.insert(&event).await?;
        Ok(event)
    }

    /// Send a private direct message to `recipients`.
    ///
    /// Returns one gift wrap per distinct recipient plus one addressed to
    /// this account. All of them are stored locally; publishing is up to the
    /// caller.
    pub async fn send_private_message(
        &self,
        recipients: &[PublicKey],
        message: impl Into<String>,
    ) -> Result<Vec<Event>> {
        if recipients.is_empty() {
            return Err(KernelError::InvalidOperation(
                "private message needs at least one recipient".into(),
            ));
        }

        let me = self.pubkey();
        let rumor = EventTemplate::new(Kind::PRIVATE_DIRECT_MESSAGE, message)
            .tags(recipients.iter().map(Tag::pubkey))
            .to_unsigned(me);

        let wraps = self
            .bounded(giftwrap::wrap_for_recipients(
                self.signer.as_ref(),
                &rumor,
                recipients,
                self.config.gift_wrap_expiration,
            ))
            .await?;

        for wrap in &wraps {
            self.store.insert(wrap).await?;
        }

        {
            let mut inbox = self.inbox_mut();
            for wrap in wraps.iter().filter(|w| w.tagged_pubkeys().first() == Some(&me)) {
                inbox.attempted.insert(*wrap.id());
            }
            if self.config.store_unwrapped_rumors {
                inbox.rumors.insert(*rumor.id(), rumor.clone());
            }
        }

        tracing::debug!(rumor = %rumor.id(), wraps = wraps.len(), "sent private message");
        Ok(wraps)
    }

    /// Send a legacy kind 4 direct message encrypted with NIP-04.
    pub async fn send_legacy_direct_message(
        &self,
        recipient: &PublicKey,
        message: &str,
    ) -> Result<Event> {
        let content = self
            .bounded(self.signer.nip04_encrypt(message, recipient))
            .await?;
        let template =
            EventTemplate::new(Kind::ENCRYPTED_DIRECT_MESSAGE, content).tag(Tag::pubkey(recipient));
        self.sign_and_store(&template).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Receiving
    // ─────────────────────────────────────────────────────────────────────────

    /// Ingest an event from outside, typically from a relay.
    ///
    /// Gift wraps addressed to this account are opened on first sight.
    pub async fn ingest(&self, event: &Event) -> Result<IngestOutcome> {
        if self.config.verify_on_ingest {
            if let Err(err) = validate_event(event) {
                tracing::warn!(id = %event.id(), %err, "refusing invalid event");
                return Ok(IngestOutcome::Invalid(err.to_string()));
            }
        }

        match self.store.insert(event).await {
            Ok(InsertResult::Inserted) => {}
            Ok(InsertResult::AlreadyExists) => return Ok(IngestOutcome::Duplicate),
            Err(StoreError::Rejected(reason)) => {
                tracing::debug!(id = %event.id(), %reason, "store refused event");
                return Ok(IngestOutcome::Rejected(reason));
            }
            Err(err) => return Err(err.into()),
        }

        if event.kind() == Kind::GIFT_WRAP && event.tagged_pubkeys().contains(&self.pubkey()) {
            if let Some(rumor) = self.open_once(event).await {
                return Ok(IngestOutcome::PrivateMessage {
                    wrap_id: *event.id(),
                    rumor,
                });
            }
        }
        Ok(IngestOutcome::Stored(*event.id()))
    }

    /// Open a gift wrap or seal addressed to this account.
    ///
    /// Anything that cannot be opened yields `None`; the cause is logged.
    pub async fn decrypt_private(&self, event: &Event) -> Option<Rumor> {
        let opened = match event.kind() {
            Kind::GIFT_WRAP => {
                self.bounded(giftwrap::unwrap_and_unseal(self.signer.as_ref(), event))
                    .await
            }
            Kind::SEAL => {
                self.bounded(giftwrap::unseal(self.signer.as_ref(), event))
                    .await
            }
            other => Err(KernelError::InvalidOperation(format!(
                "kind {} is not a private message layer",
                other
            ))),
        };

        match opened {
            Ok(rumor) => Some(rumor),
            Err(err) => {
                tracing::debug!(id = %event.id(), %err, "private message not decryptable");
                None
            }
        }
    }

    /// Decrypt the content of a kind 4 direct message sent to or by this
    /// account.
    pub async fn decrypt_direct_message(&self, event: &Event) -> Option<String> {
        if event.kind() != Kind::ENCRYPTED_DIRECT_MESSAGE {
            return None;
        }
        let me = self.pubkey();
        let peer = if *event.pubkey() == me {
            *event.tagged_pubkeys().first()?
        } else {
            *event.pubkey()
        };

        match self
            .bounded(self.signer.decrypt_auto(event.content(), &peer))
            .await
        {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::debug!(id = %event.id(), %err, "direct message not decryptable");
                None
            }
        }
    }

    async fn open_once(&self, wrap: &Event) -> Option<Rumor> {
        if !self.inbox_mut().attempted.insert(*wrap.id()) {
            return None;
        }
        let rumor = self.decrypt_private(wrap).await?;
        if self.config.store_unwrapped_rumors {
            self.inbox_mut().rumors.insert(*rumor.id(), rumor.clone());
        }
        Some(rumor)
    }

    /// Fetch gift wraps addressed to this account from a relay and open the
    /// ones not seen before.
    pub async fn fetch_private_messages<T: RelayTransport>(
        &self,
        session: &mut RelaySession<T>,
        since: Option<Timestamp>,
    ) -> Result<(FetchReport, Vec<Rumor>)> {
        let mut filter = Filter::new()
            .kind(Kind::GIFT_WRAP)
            .pubkey_tag(&self.pubkey());
        filter.since = since;

        let report = session
            .fetch_into(self.store.as_ref(), vec![filter.clone()])
            .await?;

        let mut opened = Vec::new();
        for wrap in self.store.query(&[filter]).await? {
            if let Some(rumor) = self.open_once(&wrap).await {
                opened.push(rumor);
            }
        }
        Ok((report, opened))
    }

    /// Opened private messages, oldest first.
    pub fn private_messages(&self) -> Vec<Rumor> {
        let mut rumors: Vec<Rumor> = self.inbox().rumors.values().cloned().collect();
        rumors.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        rumors
    }

    /// Opened private messages exchanged with `peer`.
    pub fn conversation_with(&self, peer: &PublicKey) -> Vec<Rumor> {
        let me = self.pubkey();
        self.private_messages()
            .into_iter()
            .filter(|rumor| {
                let tagged = rumor.tagged_pubkeys();
                (rumor.pubkey() == peer && tagged.contains(&me))
                    || (*rumor.pubkey() == me && tagged.contains(peer))
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Housekeeping
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove stored events whose expiration has passed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        Ok(self.store.delete_expired_events(unix_now()).await?)
    }

    /// Forget every cached shared secret and opened message.
    pub fn logout(&self) {
        self.cache.clear();
        let mut inbox = self.inbox_mut();
        inbox.attempted.clear();
        inbox.rumors.clear();
        tracing::debug!(pubkey = %self.pubkey(), "logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_kernel_crypto::ReadOnlySigner;
    use nostr_kernel_store::MemoryStore;

    fn account() -> Account<MemoryStore> {
        Account::from_keypair(
            Keypair::generate(),
            Arc::new(MemoryStore::new()),
            AccountConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_sign_and_store() {
        let alice = account();
        let event = alice
            .sign_and_store(&EventTemplate::new(Kind::TEXT_NOTE, "gm"))
            .await
            .unwrap();

        assert_eq!(*event.pubkey(), alice.pubkey());
        assert!(event.verify().is_ok());
        assert!(alice.store().get(event.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ephemeral_sign_and_store_is_rejected() {
        let alice = account();
        let err = alice
            .sign_and_store(&EventTemplate::new(Kind(20001), "typing"))
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::Store(StoreError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_private_message_reaches_recipient() {
        let alice = account();
        let bob = account();

        let wraps = alice
            .send_private_message(&[bob.pubkey()], "hi bob")
            .await
            .unwrap();
        assert_eq!(wraps.len(), 2);

        let for_bob = wraps
            .iter()
            .find(|w| w.tagged_pubkeys() == vec![bob.pubkey()])
            .unwrap();
        match bob.ingest(for_bob).await.unwrap() {
            IngestOutcome::PrivateMessage { wrap_id, rumor } => {
                assert_eq!(wrap_id, *for_bob.id());
                assert_eq!(rumor.content(), "hi bob");
                assert_eq!(*rumor.pubkey(), alice.pubkey());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(bob.ingest(for_bob).await.unwrap(), IngestOutcome::Duplicate);
        assert_eq!(bob.conversation_with(&alice.pubkey()).len(), 1);
        assert_eq!(alice.conversation_with(&bob.pubkey()).len(), 1);
    }

    #[tokio::test]
    async fn test_wrap_for_someone_else_is_only_stored() {
        let alice = account();
        let bob = account();
        let carol = account();

        let wraps = alice
            .send_private_message(&[bob.pubkey()], "not for carol")
            .await
            .unwrap();
        let for_bob = wraps
            .iter()
            .find(|w| w.tagged_pubkeys() == vec![bob.pubkey()])
            .unwrap();

        assert_eq!(
            carol.ingest(for_bob).await.unwrap(),
            IngestOutcome::Stored(*for_bob.id())
        );
        assert!(carol.decrypt_private(for_bob).await.is_none());
        assert!(carol.private_messages().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_event_is_invalid() {
        let alice = account();
        let bob = account();
        let note = alice
            .sign(&EventTemplate::new(Kind::TEXT_NOTE, "original"))
            .await
            .unwrap();
        let forged = Event::from_parts_unchecked(
            *note.id(),
            *note.pubkey(),
            note.created_at(),
            note.kind(),
            note.tags().to_vec(),
            "forged".into(),
            *note.sig(),
        );

        assert!(matches!(
            bob.ingest(&forged).await.unwrap(),
            IngestOutcome::Invalid(_)
        ));
        assert!(bob.store().get(forged.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_event_is_rejected_on_ingest() {
        let alice = account();
        let bob = account();
        let old = alice
            .sign(
                &EventTemplate::new(Kind::TEXT_NOTE, "gone")
                    .tag(Tag::expiration(unix_now() - 10)),
            )
            .await
            .unwrap();
        assert!(matches!(
            bob.ingest(&old).await.unwrap(),
            IngestOutcome::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_legacy_direct_message_both_sides() {
        let alice = account();
        let bob = account();

        let dm = alice
            .send_legacy_direct_message(&bob.pubkey(), "old school")
            .await
            .unwrap();
        assert_eq!(dm.kind(), Kind::ENCRYPTED_DIRECT_MESSAGE);
        assert!(dm.content().contains("?iv="));

        assert_eq!(
            bob.decrypt_direct_message(&dm).await.as_deref(),
            Some("old school")
        );
        assert_eq!(
            alice.decrypt_direct_message(&dm).await.as_deref(),
            Some("old school")
        );
    }

    #[tokio::test]
    async fn test_logout_clears_cache_and_inbox() {
        let alice = account();
        let bob = account();
        alice
            .send_private_message(&[bob.pubkey()], "hello")
            .await
            .unwrap();
        assert!(!alice.cache().is_empty());
        assert_eq!(alice.private_messages().len(), 1);

        alice.logout();
        assert!(alice.cache().is_empty());
        assert!(alice.private_messages().is_empty());
    }

    #[tokio::test]
    async fn test_read_only_account_cannot_send() {
        let store = Arc::new(MemoryStore::new());
        let signer = Arc::new(ReadOnlySigner::new(Keypair::generate().public_key()));
        let account = Account::new(
            signer,
            store,
            Arc::new(SharedSecretCache::new()),
            AccountConfig::default(),
        );

        assert!(!account.is_writeable());
        let err = account
            .send_private_message(&[Keypair::generate().public_key()], "x")
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::Wrap(_)));
        assert!(matches!(
            account.sign(&EventTemplate::new(Kind::TEXT_NOTE, "x")).await,
            Err(KernelError::Signer(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_recipient_list_is_refused() {
        let alice = account();
        assert!(matches!(
            alice.send_private_message(&[], "nobody").await,
            Err(KernelError::InvalidOperation(_))
        ));
    }
}
