//! # Nostr Kernel Store
//!
//! Local event storage behind a trait, with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The [`EventStore`] trait keeps the kernel storage-agnostic. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for tests. Both
//! enforce the same admission rules.
//!
//! ## Key Types
//!
//! - [`EventStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of inserting an event
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nostr_kernel_core::{Filter, Kind};
//! use nostr_kernel_store::{EventStore, SqliteStore};
//!
//! async fn example() -> nostr_kernel_store::Result<()> {
//!     let store = SqliteStore::open("events.db")?;
//!
//!     // let event: Event = ...;
//!     // store.insert(&event).await?;
//!
//!     let notes = store.query(&[Filter::new().kind(Kind::TEXT_NOTE).limit(20)]).await?;
//!     println!("{} notes", notes.len());
//!
//!     store.delete_expired_events(nostr_kernel_core::unix_now()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Rules
//!
//! - **Idempotent inserts**: inserting the same event twice returns `AlreadyExists`
//! - **Ephemeral kinds** (20000..30000) are never stored
//! - **Expired events** are refused on insert and removed by
//!   [`EventStore::delete_expired_events`]
//! - **Immutable rows**: updates abort; events are only inserted or deleted

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    check_admissible, newest_first, EventStore, EventStoreExt, InsertResult, REJECT_EPHEMERAL,
    REJECT_EXPIRED,
};
