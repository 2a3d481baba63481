//! In-memory implementation of the EventStore trait.
//!
//! Primarily for testing. It applies the same admission rules as the SQLite
//! triggers but keeps everything in memory with no persistence.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use nostr_kernel_core::{unix_now, Event, EventId, Filter, Timestamp};

use crate::error::Result;
use crate::traits::{check_admissible, newest_first, EventStore, InsertResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<HashMap<EventId, Event>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EventId, Event>> {
        self.events.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EventId, Event>> {
        self.events.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Ids selected by `filter`, newest first, limit applied.
    fn select(events: &HashMap<EventId, Event>, filter: &Filter) -> Vec<EventId> {
        let mut hits: Vec<&Event> = events.values().filter(|e| filter.matches(e)).collect();
        hits.sort_by(|a, b| newest_first(a, b));
        hits.into_iter()
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|e| *e.id())
            .collect()
    }

    fn select_all(events: &HashMap<EventId, Event>, filters: &[Filter]) -> HashSet<EventId> {
        filters
            .iter()
            .flat_map(|filter| Self::select(events, filter))
            .collect()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert(&self, event: &Event) -> Result<InsertResult> {
        let mut events = self.write();

        if events.contains_key(event.id()) {
            return Ok(InsertResult::AlreadyExists);
        }
        if let Err(err) = check_admissible(event, unix_now()) {
            tracing::debug!(id = %event.id(), %err, "store rejected event");
            return Err(err);
        }

        events.insert(*event.id(), event.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get(&self, id: &EventId) -> Result<Option<Event>> {
        Ok(self.read().get(id).cloned())
    }

    async fn query(&self, filters: &[Filter]) -> Result<Vec<Event>> {
        let events = self.read();
        let mut found: Vec<Event> = Self::select_all(&events, filters)
            .into_iter()
            .filter_map(|id| events.get(&id).cloned())
            .collect();
        found.sort_by(newest_first);
        Ok(found)
    }

    async fn count(&self, filters: &[Filter]) -> Result<usize> {
        Ok(Self::select_all(&self.read(), filters).len())
    }

    async fn delete(&self, filters: &[Filter]) -> Result<usize> {
        let mut events = self.write();
        let doomed = Self::select_all(&events, filters);
        for id in &doomed {
            events.remove(id);
        }
        Ok(doomed.len())
    }

    async fn delete_expired_events(&self, now: Timestamp) -> Result<usize> {
        let mut events = self.write();
        let before = events.len();
        events.retain(|_, event| !event.is_expired(now));
        Ok(before - events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::traits::EventStoreExt;
    use nostr_kernel_core::{EventTemplate, Keypair, Kind, Tag, DAY_SECS};

    fn make_event(keypair: &Keypair, kind: Kind, created_at: Timestamp, tags: Vec<Tag>) -> Event {
        EventTemplate::new(kind, "memory")
            .created_at(created_at)
            .tags(tags)
            .to_unsigned(keypair.public_key())
            .sign(keypair)
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_get_and_idempotence() {
        let store = MemoryStore::new();
        let event = make_event(&Keypair::generate(), Kind::TEXT_NOTE, 1, vec![]);

        assert_eq!(store.insert(&event).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.insert(&event).await.unwrap(), InsertResult::AlreadyExists);
        assert_eq!(store.get(event.id()).await.unwrap(), Some(event.clone()));
        assert!(store.contains(event.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejections_match_sqlite_rules() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();
        let now = unix_now();

        let ephemeral = make_event(&keypair, Kind(25000), now, vec![]);
        assert!(matches!(
            store.insert(&ephemeral).await,
            Err(StoreError::Rejected(_))
        ));

        let expired = make_event(&keypair, Kind::TEXT_NOTE, now, vec![Tag::expiration(now - 5)]);
        assert!(matches!(
            store.insert(&expired).await,
            Err(StoreError::Rejected(_))
        ));
        assert_eq!(store.count(&[Filter::new()]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_limit_and_order() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();
        for t in [3, 1, 2] {
            store.insert(&make_event(&keypair, Kind::TEXT_NOTE, t, vec![])).await.unwrap();
        }

        let found = store.query(&[Filter::new().limit(2)]).await.unwrap();
        let times: Vec<_> = found.iter().map(|e| e.created_at()).collect();
        assert_eq!(times, vec![3, 2]);

        let newest = store.query_one(Filter::new()).await.unwrap().unwrap();
        assert_eq!(newest.created_at(), 3);
    }

    #[tokio::test]
    async fn test_delete_and_sweep() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();
        let now = unix_now();

        let expiring = make_event(&keypair, Kind::TEXT_NOTE, now, vec![Tag::expiration(now + 30)]);
        let metadata = make_event(&keypair, Kind::METADATA, now, vec![]);
        let note = make_event(&keypair, Kind::TEXT_NOTE, now - 1, vec![]);
        for event in [&expiring, &metadata, &note] {
            store.insert(event).await.unwrap();
        }

        assert_eq!(store.delete_expired_events(now + DAY_SECS).await.unwrap(), 1);
        assert_eq!(
            store.delete(&[Filter::new().kind(Kind::METADATA)]).await.unwrap(),
            1
        );
        assert_eq!(store.query(&[Filter::new()]).await.unwrap(), vec![note]);
    }
}
