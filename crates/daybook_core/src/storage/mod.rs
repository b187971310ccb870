//! Durable storage collaborator contracts.
//!
//! # Responsibility
//! - Define the capability the stores persist through: named collections of
//!   id-keyed payloads plus single-value preferences.
//! - Classify storage failures so stores can decide between degrading and
//!   reporting.
//!
//! # Invariants
//! - Payloads are opaque serialized strings; decoding belongs to stores.
//! - `get_all` returns records in first-insertion order.
//! - `poll_external_changes` never returns changes written by `origin()`.

use crate::db::DbError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod handle;
mod sqlite;

pub use handle::StorageHandle;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    /// The environment offers no durable storage for this session.
    Unavailable(String),
    /// A durable operation exceeded the configured busy timeout.
    Timeout,
    /// The storage handle was closed by the composition root.
    Closed,
    Db(DbError),
}

impl StorageError {
    /// Whether stores should fall back to memory-only mode on this error.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Closed)
    }

    /// Stable code used in `error_code=` log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "storage_unavailable",
            Self::Timeout => "storage_timeout",
            Self::Closed => "storage_closed",
            Self::Db(_) => "storage_db_error",
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "durable storage unavailable: {reason}"),
            Self::Timeout => write!(f, "durable storage operation timed out"),
            Self::Closed => write!(f, "durable storage handle is closed"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Timeout,
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// One persisted collection entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: String,
    /// Serialized record body.
    pub payload: String,
}

/// Change to a stored preference observed from another process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// New serialized value; `None` when the value was removed.
    pub new_value: Option<String>,
    /// Origin id of the writing process.
    pub origin: String,
}

/// Durable storage capability used by collection and preference stores.
pub trait DurableStorage {
    /// Stable id of this process's connection, stamped on preference writes.
    fn origin(&self) -> &str;
    /// Creates the collection with `records` unless it already exists.
    ///
    /// Returns `true` when it was created. Creation and seeding commit
    /// together; on error neither is kept.
    fn create_collection(&self, name: &str, records: &[StoredRecord]) -> StorageResult<bool>;
    fn get_all(&self, name: &str) -> StorageResult<Vec<StoredRecord>>;
    /// Inserts or replaces a record, keeping its first-insert position on replace.
    fn put(&self, name: &str, record: &StoredRecord) -> StorageResult<()>;
    /// Deletes one record. Returns `false` when the id was not stored.
    fn delete(&self, name: &str, id: &str) -> StorageResult<bool>;
    fn clear(&self, name: &str) -> StorageResult<()>;
    fn get_preference(&self, key: &str) -> StorageResult<Option<String>>;
    fn set_preference(&self, key: &str, value: Option<&str>) -> StorageResult<()>;
    /// Returns preference writes by other origins since the previous poll.
    fn poll_external_changes(&self) -> StorageResult<Vec<StorageEvent>>;
    /// Releases the underlying connection. Later calls fail with `Closed`.
    fn close(&self) -> StorageResult<()>;
}
