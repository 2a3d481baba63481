//! # Nostr Kernel Relay
//!
//! Client side of the relay protocol: command framing, filter window
//! rotation and a session that ties both to a transport.
//!
//! ## Overview
//!
//! A relay speaks JSON arrays over one text connection. The client sends
//! `EVENT`, `REQ`, `CLOSE`, `AUTH` and `COUNT`; the relay answers with
//! `EVENT`, `OK`, `EOSE`, `CLOSED`, `NOTICE`, `AUTH` and `COUNT`.
//!
//! Relays cap the number of filters per `REQ`. The [`SubscriptionAssembler`]
//! keeps the full filter list per subscription and sends it a window at a
//! time, moving to the next window on each `EOSE`. Windows already seen
//! resume from their last `EOSE` time.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nostr_kernel_core::{Filter, Kind};
//! use nostr_kernel_relay::{memory::duplex, RelayConfig, RelaySession};
//! use nostr_kernel_store::MemoryStore;
//!
//! async fn example() -> nostr_kernel_relay::Result<()> {
//!     let (client, _relay) = duplex(64);
//!     let mut session = RelaySession::new("wss://relay.example", client, RelayConfig::default());
//!
//!     let store = MemoryStore::new();
//!     let report = session
//!         .fetch_into(&store, vec![Filter::new().kind(Kind::TEXT_NOTE).limit(50)])
//!         .await?;
//!     println!("stored {} new events", report.inserted);
//!     Ok(())
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Client                              Relay
//!   |-------- REQ sub [f0..f9] ------->|
//!   |<------- EVENT sub ... -----------|
//!   |<------- EOSE sub ----------------|
//!   |-------- REQ sub [f10..f19] ----->|
//!   |<------- EVENT sub ... -----------|
//!   |<------- EOSE sub ----------------|
//!   |-------- CLOSE sub -------------->|
//! ```

pub mod error;
pub mod messages;
pub mod session;
pub mod subscription;
pub mod transport;

pub use error::{RelayError, Result};
pub use messages::{new_subscription_id, ClientCommand, RelayMessage, MAX_SUBSCRIPTION_ID_LEN};
pub use session::{
    auth_template, FetchReport, OkReply, RelayConfig, RelayNotification, RelaySession,
    AUTH_REQUIRED_PREFIX,
};
pub use subscription::{SubStatus, SubscriptionAssembler};
pub use transport::{memory, RelayTransport};
