//! Rumor, seal and gift-wrap layering for private messages.
//!
//! ```text
//! Event ──strip sig──▶ Rumor ──nip44(author → recipient), kind 13──▶ Seal
//!       ──nip44(ephemeral → recipient), kind 1059, p-tag──▶ GiftWrap
//! ```
//!
//! The seal is signed by the real author; the wrap is signed by a key that is
//! generated for that one wrap and then dropped. Both carry a `created_at`
//! drawn uniformly from the past two days. Unwrapping reverses the steps and
//! fails closed at each layer.

use rand::Rng;
use std::time::Duration;

use nostr_kernel_core::{
    unix_now, validate_event, Event, EventTemplate, Keypair, Kind, PublicKey, Rumor, Tag,
    Timestamp, DAY_SECS,
};

use crate::error::WrapError;
use crate::nip44;
use crate::signer::NostrSigner;

/// Width of the timestamp jitter window, and the minimum lead of any
/// expiration over the real send time.
pub const TIMESTAMP_WINDOW_SECS: i64 = 2 * DAY_SECS;

/// A timestamp uniformly drawn from `[now - 2 days, now]`.
pub fn randomized_timestamp(now: Timestamp) -> Timestamp {
    now - rand::thread_rng().gen_range(0..=TIMESTAMP_WINDOW_SECS)
}

/// Expiration for a layer with jittered `created_at`.
///
/// Offset by the jitter window so the tag never lands before the message
/// could have been delivered.
pub fn expiration_after(created_at: Timestamp, delta: Duration) -> Timestamp {
    let delta = i64::try_from(delta.as_secs()).unwrap_or(i64::MAX);
    created_at
        .saturating_add(delta)
        .saturating_add(TIMESTAMP_WINDOW_SECS)
}

fn expect_kind(event: &Event, expected: Kind) -> Result<(), WrapError> {
    if event.kind() != expected {
        return Err(WrapError::UnexpectedKind {
            expected,
            got: event.kind(),
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Wrap direction
// ─────────────────────────────────────────────────────────────────────────────

/// Encrypt a rumor to `recipient` and sign the kind 13 seal as its author.
pub async fn seal<S>(
    signer: &S,
    rumor: &Rumor,
    recipient: &PublicKey,
    expiration: Option<Duration>,
) -> Result<Event, WrapError>
where
    S: NostrSigner + ?Sized,
{
    if *rumor.pubkey() != signer.pubkey() {
        return Err(WrapError::AuthorMismatch {
            seal: signer.pubkey(),
            rumor: *rumor.pubkey(),
        });
    }

    let content = signer.nip44_encrypt(&rumor.to_json(), recipient).await?;
    let created_at = randomized_timestamp(unix_now());

    let mut template = EventTemplate::new(Kind::SEAL, content).created_at(created_at);
    if let Some(delta) = expiration {
        template = template.tag(Tag::expiration(expiration_after(created_at, delta)));
    }

    Ok(signer.sign(&template).await?)
}

/// Wrap a seal for `recipient` under a freshly generated one-time key.
pub fn gift_wrap(
    seal: &Event,
    recipient: &PublicKey,
    expiration: Option<Duration>,
) -> Result<Event, WrapError> {
    let ephemeral = Keypair::generate();
    let content = nip44::encrypt_to(&ephemeral, recipient, &seal.to_json())
        .map_err(crate::error::SignerError::from)?;
    let created_at = randomized_timestamp(unix_now());

    let mut template = EventTemplate::new(Kind::GIFT_WRAP, content)
        .tag(Tag::pubkey(recipient))
        .created_at(created_at);
    if let Some(delta) = expiration {
        template = template.tag(Tag::expiration(expiration_after(created_at, delta)));
    }

    Ok(template.to_unsigned(ephemeral.public_key()).sign(&ephemeral)?)
}

/// Seal then wrap a rumor for one recipient.
pub async fn seal_and_wrap<S>(
    signer: &S,
    rumor: &Rumor,
    recipient: &PublicKey,
    expiration: Option<Duration>,
) -> Result<Event, WrapError>
where
    S: NostrSigner + ?Sized,
{
    let sealed = seal(signer, rumor, recipient, expiration).await?;
    gift_wrap(&sealed, recipient, expiration)
}

/// One gift wrap per distinct recipient, plus one addressed to the author so
/// the author's other devices see the sent message.
pub async fn wrap_for_recipients<S>(
    signer: &S,
    rumor: &Rumor,
    recipients: &[PublicKey],
    expiration: Option<Duration>,
) -> Result<Vec<Event>, WrapError>
where
    S: NostrSigner + ?Sized,
{
    let author = signer.pubkey();
    let mut targets: Vec<PublicKey> = Vec::with_capacity(recipients.len() + 1);
    for pk in recipients.iter().chain(std::iter::once(&author)) {
        if !targets.contains(pk) {
            targets.push(*pk);
        }
    }

    let mut wraps = Vec::with_capacity(targets.len());
    for recipient in &targets {
        wraps.push(seal_and_wrap(signer, rumor, recipient, expiration).await?);
    }
    tracing::debug!(rumor = %rumor.id(), wraps = wraps.len(), "gift wrapped rumor");
    Ok(wraps)
}

// ─────────────────────────────────────────────────────────────────────────────
// Unwrap direction
// ─────────────────────────────────────────────────────────────────────────────

/// Open a gift wrap addressed to `signer`, returning the verified seal.
pub async fn unwrap<S>(signer: &S, wrap: &Event) -> Result<Event, WrapError>
where
    S: NostrSigner + ?Sized,
{
    expect_kind(wrap, Kind::GIFT_WRAP)?;
    if let Some(addressee) = wrap.tagged_pubkeys().first() {
        if *addressee != signer.pubkey() {
            return Err(WrapError::NotRecipient(*addressee));
        }
    }
    validate_event(wrap)?;

    let json = signer.nip44_decrypt(wrap.content(), wrap.pubkey()).await?;
    let sealed = Event::from_json(&json)?;

    expect_kind(&sealed, Kind::SEAL)?;
    validate_event(&sealed)?;
    Ok(sealed)
}

/// Open a seal, returning the rumor. The seal must verify, and the rumor
/// must claim the seal's signer as its author.
pub async fn unseal<S>(signer: &S, sealed: &Event) -> Result<Rumor, WrapError>
where
    S: NostrSigner + ?Sized,
{
    expect_kind(sealed, Kind::SEAL)?;
    validate_event(sealed)?;

    let json = signer.nip44_decrypt(sealed.content(), sealed.pubkey()).await?;
    let rumor = Rumor::from_json(&json)?;

    if rumor.pubkey() != sealed.pubkey() {
        return Err(WrapError::AuthorMismatch {
            seal: *sealed.pubkey(),
            rumor: *rumor.pubkey(),
        });
    }
    Ok(rumor)
}

/// Both layers at once.
pub async fn unwrap_and_unseal<S>(signer: &S, wrap: &Event) -> Result<Rumor, WrapError>
where
    S: NostrSigner + ?Sized,
{
    let sealed = unwrap(signer, wrap).await?;
    unseal(signer, &sealed).await
}

/// [`unwrap`] that logs and swallows the cause.
pub async fn unwrap_or_none<S>(signer: &S, wrap: &Event) -> Option<Event>
where
    S: NostrSigner + ?Sized,
{
    match unwrap(signer, wrap).await {
        Ok(sealed) => Some(sealed),
        Err(e) => {
            tracing::debug!(wrap = %wrap.id(), error = %e, "could not unwrap gift wrap");
            None
        }
    }
}

/// [`unseal`] that logs and swallows the cause.
pub async fn unseal_or_none<S>(signer: &S, sealed: &Event) -> Option<Rumor>
where
    S: NostrSigner + ?Sized,
{
    match unseal(signer, sealed).await {
        Ok(rumor) => Some(rumor),
        Err(e) => {
            tracing::debug!(seal = %sealed.id(), error = %e, "could not unseal");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignerError;
    use crate::signer::{InternalSigner, ReadOnlySigner};
    use nostr_kernel_core::Signature;
    use std::collections::HashSet;

    fn signer() -> InternalSigner {
        InternalSigner::from_keypair(Keypair::generate())
    }

    fn dm(author: &InternalSigner, to: &PublicKey, text: &str) -> Rumor {
        EventTemplate::new(Kind::PRIVATE_DIRECT_MESSAGE, text)
            .tag(Tag::pubkey(to))
            .to_unsigned(author.pubkey())
    }

    #[tokio::test]
    async fn test_wrap_unwrap_recovers_rumor() {
        let alice = signer();
        let bob = signer();
        let rumor = dm(&alice, &bob.pubkey(), "Hi There!");

        let wrap = seal_and_wrap(&alice, &rumor, &bob.pubkey(), None).await.unwrap();
        assert_eq!(wrap.kind(), Kind::GIFT_WRAP);
        assert_ne!(*wrap.pubkey(), alice.pubkey());
        assert_ne!(*wrap.pubkey(), bob.pubkey());
        assert_eq!(wrap.tagged_pubkeys(), vec![bob.pubkey()]);

        let sealed = unwrap(&bob, &wrap).await.unwrap();
        assert_eq!(sealed.kind(), Kind::SEAL);
        assert_eq!(*sealed.pubkey(), alice.pubkey());
        assert!(sealed.tags().is_empty());

        let opened = unseal(&bob, &sealed).await.unwrap();
        assert_eq!(opened, rumor);
    }

    #[tokio::test]
    async fn test_wrong_recipient_cannot_unwrap() {
        let alice = signer();
        let bob = signer();
        let eve = signer();
        let rumor = dm(&alice, &bob.pubkey(), "not for eve");
        let wrap = seal_and_wrap(&alice, &rumor, &bob.pubkey(), None).await.unwrap();

        assert!(matches!(
            unwrap(&eve, &wrap).await,
            Err(WrapError::NotRecipient(pk)) if pk == bob.pubkey()
        ));

        // Past the addressing check, the seal still only opens for bob.
        let sealed = unwrap(&bob, &wrap).await.unwrap();
        let err = unseal(&eve, &sealed).await.unwrap_err();
        assert!(matches!(
            err,
            WrapError::Signer(ref e) if e.is_decryption_failure()
        ));
        assert!(unseal_or_none(&eve, &sealed).await.is_none());
    }

    #[tokio::test]
    async fn test_seal_requires_author_signer() {
        let alice = signer();
        let mallory = signer();
        let bob = signer();
        let rumor = dm(&alice, &bob.pubkey(), "forged");

        assert!(matches!(
            seal(&mallory, &rumor, &bob.pubkey(), None).await,
            Err(WrapError::AuthorMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unseal_rejects_impersonation() {
        // Mallory seals a rumor that claims Alice wrote it.
        let alice = signer();
        let mallory = signer();
        let bob = signer();
        let rumor = dm(&alice, &bob.pubkey(), "I am alice");

        let content = mallory
            .nip44_encrypt(&rumor.to_json(), &bob.pubkey())
            .await
            .unwrap();
        let forged_seal = mallory
            .sign(&EventTemplate::new(Kind::SEAL, content))
            .await
            .unwrap();

        assert!(matches!(
            unseal(&bob, &forged_seal).await,
            Err(WrapError::AuthorMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unseal_rejects_bad_signature() {
        let alice = signer();
        let bob = signer();
        let rumor = dm(&alice, &bob.pubkey(), "tampered in transit");
        let sealed = seal(&alice, &rumor, &bob.pubkey(), None).await.unwrap();

        let broken = Event::from_parts_unchecked(
            *sealed.id(),
            *sealed.pubkey(),
            sealed.created_at(),
            sealed.kind(),
            sealed.tags().to_vec(),
            sealed.content().to_string(),
            Signature([1; 64]),
        );

        assert!(matches!(
            unseal(&bob, &broken).await,
            Err(WrapError::Invalid(_))
        ));
        assert!(unseal_or_none(&bob, &broken).await.is_none());
        assert_eq!(unseal(&bob, &sealed).await.unwrap(), rumor);
    }

    #[test]
    fn test_expiration_saturates() {
        assert_eq!(expiration_after(1_000, Duration::MAX), i64::MAX);
        assert_eq!(
            expiration_after(i64::MAX - 10, Duration::from_secs(5)),
            i64::MAX
        );
        assert_eq!(
            expiration_after(100, Duration::from_secs(60)),
            160 + TIMESTAMP_WINDOW_SECS
        );
    }

    #[tokio::test]
    async fn test_wrong_kinds_rejected() {
        let alice = signer();
        let note = alice
            .sign(&EventTemplate::new(Kind::TEXT_NOTE, "plain"))
            .await
            .unwrap();

        assert!(matches!(
            unwrap(&alice, &note).await,
            Err(WrapError::UnexpectedKind { .. })
        ));
        assert!(matches!(
            unseal(&alice, &note).await,
            Err(WrapError::UnexpectedKind { .. })
        ));
        assert!(unwrap_or_none(&alice, &note).await.is_none());
    }

    #[tokio::test]
    async fn test_read_only_signer_cannot_seal() {
        let alice = signer();
        let watcher = ReadOnlySigner::new(alice.pubkey());
        let rumor = dm(&alice, &alice.pubkey(), "x");
        assert!(matches!(
            seal(&watcher, &rumor, &alice.pubkey(), None).await,
            Err(WrapError::Signer(SignerError::ReadOnly))
        ));
    }

    #[tokio::test]
    async fn test_expiration_is_offset_past_jitter() {
        let alice = signer();
        let bob = signer();
        let rumor = dm(&alice, &bob.pubkey(), "short lived");
        let delta = Duration::from_secs(3600);
        let before = unix_now();

        let wrap = seal_and_wrap(&alice, &rumor, &bob.pubkey(), Some(delta)).await.unwrap();
        let expiration = wrap.expiration().unwrap();
        assert_eq!(expiration, wrap.created_at() + 3600 + TIMESTAMP_WINDOW_SECS);
        assert!(expiration >= before + 3600);

        let sealed = unwrap(&bob, &wrap).await.unwrap();
        assert_eq!(
            sealed.expiration().unwrap(),
            sealed.created_at() + 3600 + TIMESTAMP_WINDOW_SECS
        );
    }

    #[tokio::test]
    async fn test_wrap_for_recipients_includes_author_once() {
        let alice = signer();
        let bob = signer();
        let carol = signer();
        let rumor = dm(&alice, &bob.pubkey(), "group hello");

        let wraps = wrap_for_recipients(
            &alice,
            &rumor,
            &[bob.pubkey(), carol.pubkey(), bob.pubkey(), alice.pubkey()],
            None,
        )
        .await
        .unwrap();
        assert_eq!(wraps.len(), 3);

        for (wrap, reader) in wraps.iter().zip([&bob, &carol, &alice]) {
            let opened = unwrap_and_unseal(reader, wrap).await.unwrap();
            assert_eq!(opened.content(), "group hello");
            assert_eq!(*opened.pubkey(), alice.pubkey());
        }
    }

    #[test]
    fn test_gift_wrap_timestamps_and_keys() {
        let author = Keypair::generate();
        let recipient = Keypair::generate().public_key();
        let sealed = EventTemplate::new(Kind::SEAL, "opaque")
            .to_unsigned(author.public_key())
            .sign(&author)
            .unwrap();

        let before = unix_now();
        let mut keys = HashSet::new();
        for _ in 0..1000 {
            let wrap = gift_wrap(&sealed, &recipient, None).unwrap();
            let after = unix_now();
            assert!(wrap.created_at() >= before - TIMESTAMP_WINDOW_SECS);
            assert!(wrap.created_at() <= after);
            assert!(keys.insert(*wrap.pubkey()));
        }
    }
}
