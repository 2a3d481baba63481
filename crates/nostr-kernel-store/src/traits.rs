//! EventStore trait: the abstract interface for local event persistence.
//!
//! This trait keeps the kernel storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use std::cmp::Ordering;

use nostr_kernel_core::{Event, EventId, Filter, Timestamp};

use crate::error::{Result, StoreError};

/// Reason attached to a rejected ephemeral event.
pub const REJECT_EPHEMERAL: &str = "ephemeral events are not stored";

/// Reason attached to an event whose expiration has passed.
pub const REJECT_EXPIRED: &str = "event has already expired";

/// Result of inserting an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Event was inserted.
    Inserted,
    /// An event with the same id is already stored (idempotent, not an error).
    AlreadyExists,
}

/// The EventStore trait: async interface for event persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` keeps statements off the runtime threads.
///
/// # Rules
///
/// - **Idempotent inserts**: inserting the same id twice returns `AlreadyExists`.
/// - **Ephemeral kinds** (20000..30000) are refused with [`StoreError::Rejected`].
/// - **Expired events** (an `expiration` tag at or before now) are refused
///   with [`StoreError::Rejected`].
/// - **No updates**: a stored event never changes; it can only be deleted.
/// - **Ordering**: query results are newest first, ties broken by id ascending.
#[async_trait]
pub trait EventStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Event Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an event. The caller is expected to have validated it.
    async fn insert(&self, event: &Event) -> Result<InsertResult>;

    /// Get an event by id.
    async fn get(&self, id: &EventId) -> Result<Option<Event>>;

    /// Events matching any of `filters`, deduplicated.
    ///
    /// Each filter's `limit` caps that filter's own contribution.
    async fn query(&self, filters: &[Filter]) -> Result<Vec<Event>>;

    /// Number of distinct events `query` would return.
    async fn count(&self, filters: &[Filter]) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Deletion
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete every event matching any of `filters`. Returns how many went.
    async fn delete(&self, filters: &[Filter]) -> Result<usize>;

    /// Delete events whose expiration is at or before `now`.
    async fn delete_expired_events(&self, now: Timestamp) -> Result<usize>;
}

/// Extension trait for common store patterns.
pub trait EventStoreExt: EventStore {
    /// Whether an event with this id is stored.
    fn contains(&self, id: &EventId) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Newest event matching `filter`.
    fn query_one(
        &self,
        filter: Filter,
    ) -> impl std::future::Future<Output = Result<Option<Event>>> + Send;
}

impl<S: EventStore + ?Sized> EventStoreExt for S {
    async fn contains(&self, id: &EventId) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }

    async fn query_one(&self, filter: Filter) -> Result<Option<Event>> {
        let filter = filter.limit(1);
        Ok(self.query(std::slice::from_ref(&filter)).await?.into_iter().next())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared rules
// ─────────────────────────────────────────────────────────────────────────────

/// Apply the admission rules every store enforces.
pub fn check_admissible(event: &Event, now: Timestamp) -> Result<()> {
    if event.kind().is_ephemeral() {
        return Err(StoreError::Rejected(REJECT_EPHEMERAL.to_string()));
    }
    if event.is_expired(now) {
        return Err(StoreError::Rejected(REJECT_EXPIRED.to_string()));
    }
    Ok(())
}

/// Result order: `created_at` descending, then id ascending.
pub fn newest_first(a: &Event, b: &Event) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| a.id().cmp(b.id()))
}
