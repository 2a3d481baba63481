//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL batch that
//! moves the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: it can be called on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Cascading tag deletes depend on this, and it is per connection.
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, nostr_kernel_core::unix_now()],
            )?;
            tracing::debug!(version, "applied store migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: events, tag index and admission triggers.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE event_headers (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,          -- 64 lowercase hex
            pubkey TEXT NOT NULL,             -- 64 lowercase hex
            created_at INTEGER NOT NULL,
            kind INTEGER NOT NULL,
            d_tag TEXT,                       -- first d tag value, addressable kinds
            expiration INTEGER,               -- from the expiration tag, if any
            tags TEXT NOT NULL,               -- JSON array of arrays
            content TEXT NOT NULL,
            sig TEXT NOT NULL                 -- 128 lowercase hex
        );

        -- Single-letter tags with a value, for filter lookups
        CREATE TABLE event_tags (
            event_header_row_id INTEGER NOT NULL,
            tag_name TEXT NOT NULL,
            tag_value TEXT NOT NULL,
            FOREIGN KEY (event_header_row_id) REFERENCES event_headers(row_id) ON DELETE CASCADE
        );

        CREATE INDEX idx_event_headers_pubkey_kind ON event_headers(pubkey, kind);
        CREATE INDEX idx_event_headers_kind_created ON event_headers(kind, created_at);
        CREATE INDEX idx_event_headers_created ON event_headers(created_at);
        CREATE INDEX idx_event_headers_expiration ON event_headers(expiration)
            WHERE expiration IS NOT NULL;
        CREATE INDEX idx_event_tags_name_value ON event_tags(tag_name, tag_value);
        CREATE INDEX idx_event_tags_row ON event_tags(event_header_row_id);

        CREATE TRIGGER event_headers_no_update
        BEFORE UPDATE ON event_headers
        BEGIN
            SELECT RAISE(ABORT, 'updates are not allowed');
        END;

        CREATE TRIGGER event_tags_no_update
        BEFORE UPDATE ON event_tags
        BEGIN
            SELECT RAISE(ABORT, 'updates are not allowed');
        END;

        CREATE TRIGGER event_headers_reject_ephemeral
        BEFORE INSERT ON event_headers
        FOR EACH ROW WHEN NEW.kind >= 20000 AND NEW.kind < 30000
        BEGIN
            SELECT RAISE(ABORT, 'ephemeral events are not stored');
        END;

        CREATE TRIGGER event_headers_reject_expired
        BEFORE INSERT ON event_headers
        FOR EACH ROW WHEN NEW.expiration IS NOT NULL
            AND NEW.expiration <= CAST(strftime('%s', 'now') AS INTEGER)
        BEGIN
            SELECT RAISE(ABORT, 'event has already expired');
        END;
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_migration_creates_tables_and_triggers() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables = names(&conn, "table");
        assert!(tables.contains(&"event_headers".to_string()));
        assert!(tables.contains(&"event_tags".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));

        let triggers = names(&conn, "trigger");
        assert_eq!(
            triggers,
            vec![
                "event_headers_no_update",
                "event_headers_reject_ephemeral",
                "event_headers_reject_expired",
                "event_tags_no_update",
            ]
        );
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }

    #[test]
    fn test_update_trigger_aborts() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO event_headers (id, pubkey, created_at, kind, tags, content, sig)
             VALUES ('a', 'b', 1, 1, '[]', 'x', 'c')",
            [],
        )
        .unwrap();

        let err = conn
            .execute("UPDATE event_headers SET content = 'y'", [])
            .unwrap_err();
        assert!(err.to_string().contains("updates are not allowed"));
    }
}
