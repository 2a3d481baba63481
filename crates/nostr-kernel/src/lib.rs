//! # Nostr Kernel
//!
//! The unified API for the Nostr kernel: signed events, private messages and
//! local storage behind one [`Account`].
//!
//! ## Overview
//!
//! The kernel is a portable, offline-first library for:
//!
//! - **Events**: canonical hashing, BIP-340 signing and verification
//! - **Private messages**: rumor, seal and gift-wrap layering over NIP-44
//! - **Storage**: a local event store that refuses ephemeral and expired events
//! - **Relays**: command framing and subscriptions with filter-window rotation
//!
//! ## Key Concepts
//!
//! - **Event**: Immutable. Its id is the hash of its canonical commitment.
//! - **Rumor**: An unsigned event. Only ever travels encrypted.
//! - **Gift wrap**: A rumor sealed by its author, then wrapped under a
//!   one-time key so relays learn only the recipient.
//! - **Signer**: The capability to act for a public key, local or remote.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nostr_kernel::{Account, AccountConfig};
//! use nostr_kernel::core::{EventTemplate, Keypair, Kind};
//! use nostr_kernel::store::SqliteStore;
//!
//! async fn example() -> nostr_kernel::Result<()> {
//!     let store = Arc::new(SqliteStore::open("events.db")?);
//!     let account = Account::from_keypair(Keypair::generate(), store, AccountConfig::default());
//!
//!     let note = account
//!         .sign_and_store(&EventTemplate::new(Kind::TEXT_NOTE, "gm"))
//!         .await?;
//!     println!("published {}", note.id());
//!
//!     let friend = Keypair::generate().public_key();
//!     let wraps = account.send_private_message(&[friend], "hi").await?;
//!     println!("{} gift wraps to publish", wraps.len());
//!
//!     account.logout();
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `nostr_kernel::core` - Events, keys, filters
//! - `nostr_kernel::crypto` - Ciphers, signers, gift wraps
//! - `nostr_kernel::store` - Storage abstraction and SQLite
//! - `nostr_kernel::relay` - Relay protocol

pub mod account;
pub mod error;

// Re-export component crates
pub use nostr_kernel_core as core;
pub use nostr_kernel_crypto as crypto;
pub use nostr_kernel_relay as relay;
pub use nostr_kernel_store as store;

// Re-export main types for convenience
pub use account::{Account, AccountConfig, IngestOutcome};
pub use error::{KernelError, Result};

// Re-export commonly used core types
pub use nostr_kernel_core::{
    Event, EventId, EventTemplate, Filter, Keypair, Kind, PublicKey, Rumor, Signature, Tag,
};
pub use nostr_kernel_crypto::{NostrSigner, SharedSecretCache};
