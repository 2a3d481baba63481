//! # Nostr Kernel Core
//!
//! Pure primitives for the Nostr kernel: events, canonical hashing, keys and
//! filters.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over signed JSON events.
//!
//! ## Key Types
//!
//! - [`Event`] - A signed, immutable event
//! - [`Rumor`] - An unsigned event (content-addressed but not authenticated)
//! - [`EventTemplate`] - What an author decides before signing
//! - [`EventId`] - SHA-256 of the canonical commitment array
//! - [`Keypair`] / [`PublicKey`] / [`Signature`] - BIP-340 over secp256k1
//! - [`Filter`] - Relay subscription filter
//!
//! ## Canonicalization
//!
//! Ids hash `[0,pubkey,created_at,kind,tags,content]` serialized with a fixed
//! escaping scheme. See [`canonical`] module.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nostr_kernel_core::{EventTemplate, Keypair, Kind, Tag};
//!
//! let keypair = Keypair::generate();
//! let event = EventTemplate::new(Kind::TEXT_NOTE, "gm")
//!     .tag(Tag::from_parts(["t", "nostr"]))
//!     .to_unsigned(keypair.public_key())
//!     .sign(&keypair)
//!     .unwrap();
//! assert!(event.verify().is_ok());
//! ```

pub mod canonical;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod event;
pub mod filter;
pub mod types;
pub mod validation;

pub use canonical::{canonicalize, commitment_json, compute_event_id};
pub use crypto::{verify_signature, Keypair, PublicKey, Sha256Hash, Signature};
pub use error::{CoreError, ValidationError};
pub use event::{Event, EventTemplate, Rumor, Tag};
pub use filter::Filter;
pub use types::{unix_now, EventId, Kind, Timestamp, DAY_SECS};
pub use validation::{parse_and_validate, validate_event, validate_event_structure, validate_rumor};
