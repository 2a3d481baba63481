//! Golden test vectors for cross-implementation verification.
//!
//! Every Nostr implementation must produce identical:
//! - event ids for the same commitment fields
//! - BIP-340 signatures for the same key, message and aux randomness
//! - NIP-44 conversation keys and payloads for the same keys and nonce

use std::sync::Arc;

use anyhow::Result;
use nostr_kernel::core::{canonicalize, commitment_json, Rumor};
use nostr_kernel::store::{EventStore, MemoryStore, SqliteStore};
use nostr_kernel::{Account, AccountConfig, Event, Filter, IngestOutcome, Keypair, Kind};
use nostr_kernel_testkit::vectors::{
    all_vectors, verify_all_vectors, CHAT_RUMOR_JSON, COMMUNITY_POST_JSON, REPLY_NOTE_JSON,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn signed_vectors() -> Vec<Event> {
    all_vectors()
        .into_iter()
        .filter(|v| v.signed)
        .map(|v| Event::from_json(v.json).expect("golden event parses"))
        .collect()
}

#[test]
fn test_all_golden_vectors_pass() {
    for (name, passed, detail) in verify_all_vectors() {
        assert!(passed, "vector '{}' failed: {}", name, detail);
    }
}

#[test]
fn test_reparsed_events_keep_their_ids() -> Result<()> {
    for event in signed_vectors() {
        let reparsed = Event::from_json(&event.to_json())?;
        assert_eq!(reparsed, event);
        assert_eq!(reparsed.compute_id(), *event.id());
    }
    Ok(())
}

#[test]
fn test_commitments_are_already_canonical() -> Result<()> {
    for event in signed_vectors() {
        let commitment = commitment_json(
            event.pubkey(),
            event.created_at(),
            event.kind(),
            event.tags(),
            event.content(),
        );
        assert_eq!(canonicalize(&commitment)?, commitment);
    }
    Ok(())
}

#[test]
fn test_escaped_json_content_is_hashed_verbatim() -> Result<()> {
    // The content of this post is event JSON with its own escapes.
    let post = Event::from_json(COMMUNITY_POST_JSON)?;
    let inner = Event::from_json(post.content())?;

    assert_eq!(
        inner.id().to_hex(),
        "0b8e4fade30fdb57f3887da224682fe9756ee79c408961e46393555bb0367022"
    );
    assert_eq!(post.first_value("e"), Some(inner.id().to_hex().as_str()));
    Ok(())
}

#[test]
fn test_rumor_with_empty_sig_is_not_an_event() -> Result<()> {
    assert!(Event::from_json(CHAT_RUMOR_JSON).is_err());

    let rumor = Rumor::from_json(CHAT_RUMOR_JSON)?;
    assert_eq!(rumor.kind(), Kind::PRIVATE_DIRECT_MESSAGE);
    assert_eq!(
        rumor.id().to_hex(),
        "6cccb576158965cf0f06fb4e476f85a02f0011ae783a4e905126a3db3871e43d"
    );
    Ok(())
}

#[test]
fn test_tampered_golden_event_fails_verification() -> Result<()> {
    let json = REPLY_NOTE_JSON.replace("Amethyst agrees", "Amethyst disagrees");
    let event = Event::from_json(&json)?;
    assert!(event.verify().is_err());
    Ok(())
}

#[tokio::test]
async fn test_golden_events_ingest_idempotently() -> Result<()> {
    init_tracing();
    let account = Account::from_keypair(
        Keypair::generate(),
        Arc::new(MemoryStore::new()),
        AccountConfig::default(),
    );

    for event in signed_vectors() {
        assert_eq!(
            account.ingest(&event).await?,
            IngestOutcome::Stored(*event.id())
        );
        assert_eq!(account.ingest(&event).await?, IngestOutcome::Duplicate);
    }
    assert_eq!(account.store().count(&[Filter::new()]).await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_golden_events_survive_sqlite() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("golden.db");

    {
        let store = SqliteStore::open(&path)?;
        for event in signed_vectors() {
            store.insert(&event).await?;
        }
    }

    let store = SqliteStore::open(&path)?;
    for event in signed_vectors() {
        let loaded = store.get(event.id()).await?.expect("event persisted");
        assert_eq!(loaded, event);
        assert!(loaded.verify().is_ok());
    }

    let tagged = store
        .query(&[Filter::new().tag('t', ["iceland"])])
        .await?;
    assert_eq!(tagged.len(), 1);
    assert_eq!(
        tagged[0].id().to_hex(),
        "5fd48fd3fb2890a00538067869306d788ff4331896360dc9c7e43d43e01b481b"
    );
    Ok(())
}
