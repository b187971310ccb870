//! SQLite implementation of the durable storage collaborator.
//!
//! # Responsibility
//! - Persist collection records and preferences in migrated SQLite tables.
//! - Track preference revisions so writes from other connections can be
//!   surfaced as `StorageEvent`s.
//!
//! # Invariants
//! - Record `seq` is assigned once on first insert and never changes.
//! - Preference `revision` strictly increases across all keys.
//! - A closed storage never reopens.

use super::{DurableStorage, StorageError, StorageEvent, StorageResult, StoredRecord};
use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::{Cell, RefCell};
use std::time::Instant;
use uuid::Uuid;

const UPSERT_RECORD_SQL: &str = "INSERT INTO collection_records (collection, id, seq, payload)
VALUES (
    ?1,
    ?2,
    (SELECT COALESCE(MAX(seq), 0) + 1 FROM collection_records WHERE collection = ?1),
    ?3
)
ON CONFLICT (collection, id) DO UPDATE SET
    payload = excluded.payload,
    updated_at = (strftime('%s', 'now') * 1000);";

/// SQLite-backed durable storage bound to one connection.
pub struct SqliteStorage {
    conn: RefCell<Option<Connection>>,
    origin: String,
    last_seen_revision: Cell<i64>,
}

impl SqliteStorage {
    /// Opens the database named by `config`, or an in-memory one when no
    /// path is configured.
    ///
    /// Any open or migration failure is reported as `Unavailable`.
    pub fn open(config: &StoreConfig) -> StorageResult<Self> {
        let conn = match config.db_path.as_ref() {
            Some(path) => open_db(path, config.busy_timeout()),
            None => open_db_in_memory(config.busy_timeout()),
        }
        .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        Self::new(conn)
    }

    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> StorageResult<Self> {
        let last_seen: i64 = conn.query_row(
            "SELECT COALESCE(MAX(revision), 0) FROM preferences;",
            [],
            |row| row.get(0),
        )?;

        Ok(Self {
            conn: RefCell::new(Some(conn)),
            origin: Uuid::new_v4().to_string(),
            last_seen_revision: Cell::new(last_seen),
        })
    }

    fn with_conn<R>(
        &self,
        op: &'static str,
        target: &str,
        run: impl FnOnce(&Connection) -> rusqlite::Result<R>,
    ) -> StorageResult<R> {
        let started_at = Instant::now();
        let guard = self.conn.borrow();
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;

        match run(conn) {
            Ok(value) => {
                debug!(
                    "event=storage_op module=storage status=ok op={op} target={target} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                let err = StorageError::from(err);
                warn!(
                    "event=storage_op module=storage status=error op={op} target={target} duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }
}

impl DurableStorage for SqliteStorage {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn create_collection(&self, name: &str, records: &[StoredRecord]) -> StorageResult<bool> {
        self.with_conn("create_collection", name, |conn| {
            let tx = conn.unchecked_transaction()?;
            let created = tx.execute(
                "INSERT OR IGNORE INTO collections (name) VALUES (?1);",
                [name],
            )? == 1;
            if created {
                let mut stmt = tx.prepare(UPSERT_RECORD_SQL)?;
                for record in records {
                    stmt.execute(params![name, record.id, record.payload])?;
                }
            }
            tx.commit()?;
            Ok(created)
        })
    }

    fn get_all(&self, name: &str) -> StorageResult<Vec<StoredRecord>> {
        self.with_conn("get_all", name, |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, payload
                 FROM collection_records
                 WHERE collection = ?1
                 ORDER BY seq ASC;",
            )?;
            let rows = stmt.query_map([name], |row| {
                Ok(StoredRecord {
                    id: row.get(0)?,
                    payload: row.get(1)?,
                })
            })?;
            rows.collect()
        })
    }

    fn put(&self, name: &str, record: &StoredRecord) -> StorageResult<()> {
        self.with_conn("put", name, |conn| {
            conn.execute(UPSERT_RECORD_SQL, params![name, record.id, record.payload])?;
            Ok(())
        })
    }

    fn delete(&self, name: &str, id: &str) -> StorageResult<bool> {
        self.with_conn("delete", name, |conn| {
            let changed = conn.execute(
                "DELETE FROM collection_records WHERE collection = ?1 AND id = ?2;",
                params![name, id],
            )?;
            Ok(changed > 0)
        })
    }

    fn clear(&self, name: &str) -> StorageResult<()> {
        self.with_conn("clear", name, |conn| {
            conn.execute(
                "DELETE FROM collection_records WHERE collection = ?1;",
                [name],
            )?;
            Ok(())
        })
    }

    fn get_preference(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_conn("get_preference", key, |conn| {
            let value: Option<Option<String>> = conn
                .query_row(
                    "SELECT value FROM preferences WHERE key = ?1;",
                    [key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.flatten())
        })
    }

    fn set_preference(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        self.with_conn("set_preference", key, |conn| {
            conn.execute(
                "INSERT INTO preferences (key, value, origin, revision)
                 VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(revision), 0) + 1 FROM preferences))
                 ON CONFLICT (key) DO UPDATE SET
                    value = excluded.value,
                    origin = excluded.origin,
                    revision = excluded.revision,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![key, value, self.origin],
            )?;
            Ok(())
        })
    }

    fn poll_external_changes(&self) -> StorageResult<Vec<StorageEvent>> {
        let since = self.last_seen_revision.get();
        let rows = self.with_conn("poll_external_changes", "preferences", |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value, origin, revision
                 FROM preferences
                 WHERE revision > ?1
                 ORDER BY revision ASC;",
            )?;
            let rows = stmt.query_map([since], |row| {
                Ok((
                    StorageEvent {
                        key: row.get(0)?,
                        new_value: row.get(1)?,
                        origin: row.get(2)?,
                    },
                    row.get::<_, i64>(3)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        let mut events = Vec::with_capacity(rows.len());
        for (event, revision) in rows {
            self.last_seen_revision
                .set(self.last_seen_revision.get().max(revision));
            if event.origin != self.origin {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn close(&self) -> StorageResult<()> {
        let Some(conn) = self.conn.borrow_mut().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, err)| StorageError::from(err))
    }
}
