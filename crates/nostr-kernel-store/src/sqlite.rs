//! SQLite implementation of the EventStore trait.
//!
//! The primary storage backend. It uses rusqlite with bundled SQLite, wrapped
//! in async via tokio::spawn_blocking. Admission rules live in schema
//! triggers, so any writer to the same file gets the same guarantees.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};

use nostr_kernel_core::{
    Event, EventId, Filter, Kind, PublicKey, Signature, Tag, Timestamp,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{newest_first, EventStore, InsertResult, REJECT_EPHEMERAL, REJECT_EXPIRED};

const EVENT_COLUMNS: &str = "h.id, h.pubkey, h.created_at, h.kind, h.tags, h.content, h.sig";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Columns of one `event_headers` row, as stored.
struct StoredRow {
    id: String,
    pubkey: String,
    created_at: i64,
    kind: i64,
    tags: String,
    content: String,
    sig: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: row.get(0)?,
        pubkey: row.get(1)?,
        created_at: row.get(2)?,
        kind: row.get(3)?,
        tags: row.get(4)?,
        content: row.get(5)?,
        sig: row.get(6)?,
    })
}

impl StoredRow {
    fn into_event(self) -> Result<Event> {
        let invalid = |field: &str, e: &dyn std::fmt::Display| {
            StoreError::InvalidData(format!("{} of {}: {}", field, self.id, e))
        };

        let id = EventId::from_hex_canonical(&self.id).map_err(|e| invalid("id", &e))?;
        let pubkey =
            PublicKey::from_hex_canonical(&self.pubkey).map_err(|e| invalid("pubkey", &e))?;
        let sig = Signature::from_hex_canonical(&self.sig).map_err(|e| invalid("sig", &e))?;
        let kind = u16::try_from(self.kind).map_err(|e| invalid("kind", &e))?;
        let tags: Vec<Tag> = serde_json::from_str(&self.tags)?;

        Ok(Event::from_parts_unchecked(
            id,
            pubkey,
            self.created_at,
            Kind(kind),
            tags,
            self.content,
            sig,
        ))
    }
}

/// Turn trigger aborts into rejections; keep everything else as a database error.
fn classify(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
        if code.code == ErrorCode::ConstraintViolation
            && (message == REJECT_EPHEMERAL || message == REJECT_EXPIRED)
        {
            return StoreError::Rejected(message.clone());
        }
    }
    StoreError::Database(err)
}

// ─────────────────────────────────────────────────────────────────────────────
// Filter → SQL
// ─────────────────────────────────────────────────────────────────────────────

fn push_in(sql: &mut String, args: &mut Vec<Value>, column: &str, values: Vec<Value>) {
    if values.is_empty() {
        sql.push_str(" AND 0");
        return;
    }
    let marks = vec!["?"; values.len()].join(", ");
    sql.push_str(&format!(" AND {} IN ({})", column, marks));
    args.extend(values);
}

/// Build a `SELECT` of `columns` over `event_headers h` for one filter,
/// ordered newest first and capped by the filter's limit.
fn select_for(columns: &str, filter: &Filter) -> (String, Vec<Value>) {
    let mut sql = format!("SELECT {} FROM event_headers h WHERE 1", columns);
    let mut args = Vec::new();

    if let Some(ids) = &filter.ids {
        let values = ids.iter().map(|id| Value::Text(id.to_hex())).collect();
        push_in(&mut sql, &mut args, "h.id", values);
    }
    if let Some(authors) = &filter.authors {
        let values = authors.iter().map(|pk| Value::Text(pk.to_hex())).collect();
        push_in(&mut sql, &mut args, "h.pubkey", values);
    }
    if let Some(kinds) = &filter.kinds {
        let values = kinds
            .iter()
            .map(|k| Value::Integer(i64::from(k.as_u16())))
            .collect();
        push_in(&mut sql, &mut args, "h.kind", values);
    }
    if let Some(since) = filter.since {
        sql.push_str(" AND h.created_at >= ?");
        args.push(Value::Integer(since));
    }
    if let Some(until) = filter.until {
        sql.push_str(" AND h.created_at <= ?");
        args.push(Value::Integer(until));
    }
    for (name, values) in &filter.tags {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM event_tags t \
             WHERE t.event_header_row_id = h.row_id AND t.tag_name = ?",
        );
        args.push(Value::Text(name.to_string()));
        let values = values.iter().cloned().map(Value::Text).collect();
        push_in(&mut sql, &mut args, "t.tag_value", values);
        sql.push(')');
    }
    if let Some(search) = &filter.search {
        sql.push_str(" AND instr(lower(h.content), ?) > 0");
        args.push(Value::Text(search.to_lowercase()));
    }

    sql.push_str(" ORDER BY h.created_at DESC, h.id ASC");
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        args.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    (sql, args)
}

fn query_events(conn: &Connection, filter: &Filter) -> Result<Vec<Event>> {
    let (sql, args) = select_for(EVENT_COLUMNS, filter);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), read_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(StoredRow::into_event).collect()
}

fn query_ids(conn: &Connection, filter: &Filter) -> Result<Vec<String>> {
    let (sql, args) = select_for("h.id", filter);
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(args), |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn insert(&self, event: &Event) -> Result<InsertResult> {
        let event = event.clone();

        self.blocking(move |conn| {
            let id = event.id().to_hex();
            let tags_json = serde_json::to_string(event.tags())?;
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM event_headers WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(InsertResult::AlreadyExists);
            }

            tx.execute(
                "INSERT INTO event_headers (
                    id, pubkey, created_at, kind, d_tag, expiration, tags, content, sig
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    event.pubkey().to_hex(),
                    event.created_at(),
                    i64::from(event.kind().as_u16()),
                    event.d_tag(),
                    event.expiration(),
                    tags_json,
                    event.content(),
                    event.sig().to_hex(),
                ],
            )
            .map_err(|e| {
                let err = classify(e);
                if let StoreError::Rejected(reason) = &err {
                    tracing::debug!(id = %event.id(), %reason, "store rejected event");
                }
                err
            })?;

            let row_id = tx.last_insert_rowid();
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO event_tags (event_header_row_id, tag_name, tag_value)
                     VALUES (?1, ?2, ?3)",
                )?;
                for tag in event.tags().iter().filter(|t| t.is_indexable()) {
                    if let (Some(name), Some(value)) = (tag.name(), tag.value()) {
                        stmt.execute(params![row_id, name, value])?;
                    }
                }
            }

            tx.commit()?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get(&self, id: &EventId) -> Result<Option<Event>> {
        let id = id.to_hex();

        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM event_headers h WHERE h.id = ?1", EVENT_COLUMNS),
                    params![id],
                    read_row,
                )
                .optional()?;
            row.map(StoredRow::into_event).transpose()
        })
        .await
    }

    async fn query(&self, filters: &[Filter]) -> Result<Vec<Event>> {
        let filters = filters.to_vec();

        self.blocking(move |conn| {
            let mut seen = HashSet::new();
            let mut events = Vec::new();
            for filter in &filters {
                for event in query_events(conn, filter)? {
                    if seen.insert(*event.id()) {
                        events.push(event);
                    }
                }
            }
            events.sort_by(newest_first);
            Ok(events)
        })
        .await
    }

    async fn count(&self, filters: &[Filter]) -> Result<usize> {
        let filters = filters.to_vec();

        self.blocking(move |conn| {
            let mut seen = HashSet::new();
            for filter in &filters {
                seen.extend(query_ids(conn, filter)?);
            }
            Ok(seen.len())
        })
        .await
    }

    async fn delete(&self, filters: &[Filter]) -> Result<usize> {
        let filters = filters.to_vec();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            for filter in &filters {
                let (select, args) = select_for("h.row_id", filter);
                let sql = format!("DELETE FROM event_headers WHERE row_id IN ({})", select);
                removed += tx.execute(&sql, params_from_iter(args))?;
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn delete_expired_events(&self, now: Timestamp) -> Result<usize> {
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM event_headers WHERE expiration IS NOT NULL AND expiration <= ?1",
                params![now],
            )?;
            if removed > 0 {
                tracing::debug!(removed, now, "deleted expired events");
            }
            Ok(removed)
        })
        .await
    }
}
