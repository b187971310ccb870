//! Persisted stores layered over the durable storage collaborator.
//!
//! # Responsibility
//! - `collection`: typed CRUD over a named collection with an in-memory mirror.
//! - `preference`: single persisted values with cross-process propagation.
//!
//! # Invariants
//! - Synchronous reads always observe the latest mirror state.
//! - Caller errors (`DuplicateId`, `NotFound`, ...) leave the mirror unchanged.
//! - Storage unavailability degrades to memory-only mode and is never raised.

use crate::model::RecordValidationError;
use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection;
pub mod listeners;
pub mod preference;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    InvalidName(String),
    DuplicateId(String),
    NotFound(String),
    /// Record could not be encoded to or decoded from its persisted shape.
    Serialization(String),
    InvalidPatch(String),
    Validation(RecordValidationError),
    /// Non-mutating storage access failed (open, reload).
    Storage(StorageError),
    /// A durable write failed after the mirror was updated.
    Persist {
        collection: String,
        op: &'static str,
        source: StorageError,
        /// `true` when the optimistic mirror change was kept.
        mirror_retained: bool,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid collection name `{name}`"),
            Self::DuplicateId(id) => write!(f, "record id already exists: {id}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Serialization(message) => write!(f, "record serialization failed: {message}"),
            Self::InvalidPatch(message) => write!(f, "invalid patch: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Persist {
                collection,
                op,
                source,
                mirror_retained,
            } => write!(
                f,
                "durable {op} on `{collection}` failed ({}): {source}",
                if *mirror_retained {
                    "in-memory change kept"
                } else {
                    "in-memory change rolled back"
                }
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Persist { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}
