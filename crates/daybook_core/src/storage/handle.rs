//! Explicitly constructed storage handle passed to store constructors.
//!
//! # Responsibility
//! - Own the process's durable storage connection on behalf of the
//!   composition root (open/close lifecycle).
//! - Represent "no durable storage" as a first-class state instead of a
//!   failure, so stores can degrade to memory-only mode.

use super::{DurableStorage, SqliteStorage, StorageError, StorageResult};
use crate::config::{StoreConfig, WritePolicy};
use log::{info, warn};
use std::rc::Rc;

/// Cloneable handle to the durable storage collaborator.
///
/// Clones share the same connection.
#[derive(Clone)]
pub struct StorageHandle {
    storage: Option<Rc<dyn DurableStorage>>,
    write_policy: WritePolicy,
}

impl StorageHandle {
    /// Opens SQLite storage per `config`.
    ///
    /// Never fails: when the database cannot be opened the handle is
    /// returned in unavailable mode and a warning is logged.
    pub fn open(config: &StoreConfig) -> Self {
        match SqliteStorage::open(config) {
            Ok(storage) => {
                info!(
                    "event=storage_handle_open module=storage status=ok mode={}",
                    if config.db_path.is_some() { "file" } else { "memory" }
                );
                Self::with_storage(Rc::new(storage), config.write_policy)
            }
            Err(err) => {
                warn!(
                    "event=storage_handle_open module=storage status=degraded error_code={} error={}",
                    err.code(),
                    err
                );
                Self::unavailable(config.write_policy)
            }
        }
    }

    /// Wraps an injected storage implementation.
    pub fn with_storage(storage: Rc<dyn DurableStorage>, write_policy: WritePolicy) -> Self {
        Self {
            storage: Some(storage),
            write_policy,
        }
    }

    /// Handle for an environment without durable storage.
    pub fn unavailable(write_policy: WritePolicy) -> Self {
        Self {
            storage: None,
            write_policy,
        }
    }

    pub fn is_available(&self) -> bool {
        self.storage.is_some()
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    /// Origin id stamped on this process's preference writes.
    pub fn origin(&self) -> Option<&str> {
        self.storage.as_deref().map(|storage| storage.origin())
    }

    /// Returns the storage, or `Unavailable` for a degraded handle.
    pub fn storage(&self) -> StorageResult<Rc<dyn DurableStorage>> {
        self.storage.clone().ok_or_else(|| {
            StorageError::Unavailable("no durable storage in this environment".to_string())
        })
    }

    /// Closes the shared connection. Stores created from this handle report
    /// `Closed` on later durable writes.
    pub fn close(&self) -> StorageResult<()> {
        match self.storage.as_deref() {
            Some(storage) => {
                storage.close()?;
                info!("event=storage_handle_close module=storage status=ok");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
