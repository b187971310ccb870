//! Typed persisted collection with an in-memory mirror.
//!
//! # Responsibility
//! - Serve synchronous reads from the mirror.
//! - Apply mutations to the mirror first, then issue the durable write.
//! - Recover from write failures per `WritePolicy`.
//!
//! # Invariants
//! - Mirror ids are unique and non-empty.
//! - Mirror order is insertion order; `update` keeps a record's position.
//! - Durable writes are issued in the same order as the mutations.
//! - In degraded mode every mutation succeeds on the mirror and logs.

use super::listeners::{ListenerId, Listeners};
use super::{StoreError, StoreResult};
use crate::config::WritePolicy;
use crate::model::Entity;
use crate::storage::{DurableStorage, StorageError, StorageHandle, StorageResult, StoredRecord};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

/// Persisted collection of `T` records named by `name`.
pub struct CollectionStore<T: Entity> {
    name: String,
    storage: Option<Rc<dyn DurableStorage>>,
    write_policy: WritePolicy,
    mirror: RefCell<Vec<T>>,
    listeners: Listeners<[T]>,
}

impl<T: Entity> CollectionStore<T> {
    /// Attaches to the named collection, creating it and seeding
    /// `initial_data` when it does not exist yet.
    ///
    /// # Errors
    /// - `InvalidName` for a blank name.
    /// - `DuplicateId` / `Validation` for bad `initial_data`.
    /// - `Storage` for storage failures other than unavailability, which
    ///   degrades the store to memory-only mode instead.
    pub fn open(
        handle: &StorageHandle,
        name: impl Into<String>,
        initial_data: Vec<T>,
    ) -> StoreResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StoreError::InvalidName(name));
        }
        let initial_data = prepare_initial(initial_data)?;

        let storage = match handle.storage() {
            Ok(storage) => storage,
            Err(err) => return Ok(Self::degraded(name, handle, initial_data, &err)),
        };

        let encoded = initial_data
            .iter()
            .map(encode_record)
            .collect::<StoreResult<Vec<_>>>()?;

        let started_at = Instant::now();
        let created = match storage.create_collection(&name, &encoded) {
            Ok(created) => created,
            Err(err) if err.is_unavailable() => {
                return Ok(Self::degraded(name, handle, initial_data, &err))
            }
            Err(err) => return Err(err.into()),
        };

        let mirror = if created {
            initial_data
        } else {
            decode_all(&name, storage.get_all(&name)?)
        };

        info!(
            "event=collection_open module=store status=ok collection={} created={} records={} duration_ms={}",
            name,
            created,
            mirror.len(),
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            name,
            storage: Some(storage),
            write_policy: handle.write_policy(),
            mirror: RefCell::new(mirror),
            listeners: Listeners::new(),
        })
    }

    fn degraded(
        name: String,
        handle: &StorageHandle,
        initial_data: Vec<T>,
        cause: &StorageError,
    ) -> Self {
        warn!(
            "event=collection_open module=store status=degraded collection={} error_code={} error={}",
            name,
            cause.code(),
            cause
        );
        Self {
            name,
            storage: None,
            write_policy: handle.write_policy(),
            mirror: RefCell::new(initial_data),
            listeners: Listeners::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this store runs memory-only for the session.
    pub fn is_degraded(&self) -> bool {
        self.storage.is_none()
    }

    /// Snapshot of the mirror in insertion order.
    pub fn list(&self) -> Vec<T> {
        self.mirror.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.mirror
            .borrow()
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.mirror.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirror.borrow().is_empty()
    }

    /// Registers a callback receiving the mirror after each applied mutation.
    pub fn subscribe(&self, listener: impl Fn(&[T]) + 'static) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Inserts `record`, generating a UUID when its id is blank.
    ///
    /// Returns the stored record.
    pub fn add(&self, mut record: T) -> StoreResult<T> {
        if record.id().trim().is_empty() {
            record.set_id(Uuid::new_v4().to_string());
        }
        record.validate()?;
        let stored = encode_record(&record)?;

        {
            let mut mirror = self.mirror.borrow_mut();
            if mirror.iter().any(|existing| existing.id() == record.id()) {
                return Err(StoreError::DuplicateId(record.id().to_string()));
            }
            mirror.push(record.clone());
        }

        let id = stored.id.clone();
        self.persist(
            "add",
            |storage| storage.put(&self.name, &stored),
            |mirror| mirror.retain(|existing| existing.id() != id),
        )?;
        Ok(record)
    }

    /// Merges the top-level fields of `patch` into the record `id`.
    ///
    /// An empty patch is a no-op. The patch may not change the id or name
    /// fields the record does not have.
    pub fn update(&self, id: &str, patch: impl Serialize) -> StoreResult<T> {
        let fields = match serde_json::to_value(patch) {
            Ok(Value::Object(fields)) => fields,
            Ok(Value::Null) => serde_json::Map::new(),
            Ok(other) => {
                return Err(StoreError::InvalidPatch(format!(
                    "expected an object of fields, got `{other}`"
                )))
            }
            Err(err) => return Err(StoreError::Serialization(err.to_string())),
        };

        let (index, previous) = self.position(id)?;
        if fields.is_empty() {
            return Ok(previous);
        }

        let mut merged = serde_json::to_value(&previous)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let Some(target) = merged.as_object_mut() else {
            return Err(StoreError::Serialization(format!(
                "record `{id}` does not serialize to an object"
            )));
        };
        let unknown = fields
            .keys()
            .find(|field| !target.contains_key(field.as_str()));
        if let Some(unknown) = unknown {
            return Err(StoreError::InvalidPatch(format!(
                "record `{id}` has no field `{unknown}`"
            )));
        }
        target.extend(fields);

        let updated: T = serde_json::from_value(merged)
            .map_err(|err| StoreError::InvalidPatch(err.to_string()))?;
        if updated.id() != id {
            return Err(StoreError::InvalidPatch(format!(
                "patch cannot change id `{id}` to `{}`",
                updated.id()
            )));
        }
        updated.validate()?;
        let stored = encode_record(&updated)?;

        self.mirror.borrow_mut()[index] = updated.clone();
        self.persist(
            "update",
            |storage| storage.put(&self.name, &stored),
            |mirror| {
                if let Some(slot) = mirror.iter_mut().find(|record| record.id() == id) {
                    *slot = previous;
                }
            },
        )?;
        Ok(updated)
    }

    /// Deletes the record `id` and returns it.
    pub fn remove(&self, id: &str) -> StoreResult<T> {
        let (index, _) = self.position(id)?;
        let removed = self.mirror.borrow_mut().remove(index);

        let restored = removed.clone();
        self.persist(
            "remove",
            |storage| {
                if !storage.delete(&self.name, id)? {
                    warn!(
                        "event=collection_write module=store status=drift collection={} op=remove detail=missing_in_storage",
                        self.name
                    );
                }
                Ok(())
            },
            |mirror| {
                let at = index.min(mirror.len());
                mirror.insert(at, restored);
            },
        )?;
        Ok(removed)
    }

    /// Removes every record. Succeeds on an already empty collection.
    pub fn clear(&self) -> StoreResult<()> {
        let previous = std::mem::take(&mut *self.mirror.borrow_mut());
        self.persist(
            "clear",
            |storage| storage.clear(&self.name),
            |mirror| *mirror = previous,
        )
    }

    /// Replaces the mirror with the durable contents.
    ///
    /// No-op in degraded mode.
    pub fn reload(&self) -> StoreResult<()> {
        let Some(storage) = self.storage.as_ref() else {
            return Ok(());
        };
        let records = decode_all(&self.name, storage.get_all(&self.name)?);
        *self.mirror.borrow_mut() = records;
        self.notify();
        Ok(())
    }

    fn position(&self, id: &str) -> StoreResult<(usize, T)> {
        self.mirror
            .borrow()
            .iter()
            .enumerate()
            .find(|(_, record)| record.id() == id)
            .map(|(index, record)| (index, record.clone()))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Runs the durable half of a mutation whose mirror half already ran.
    fn persist(
        &self,
        op: &'static str,
        write: impl FnOnce(&dyn DurableStorage) -> StorageResult<()>,
        rollback: impl FnOnce(&mut Vec<T>),
    ) -> StoreResult<()> {
        let Some(storage) = self.storage.as_deref() else {
            warn!(
                "event=collection_write module=store status=degraded collection={} op={op} error_code=storage_unavailable",
                self.name
            );
            self.notify();
            return Ok(());
        };

        let started_at = Instant::now();
        match write(storage) {
            Ok(()) => {
                debug!(
                    "event=collection_write module=store status=ok collection={} op={op} duration_ms={}",
                    self.name,
                    started_at.elapsed().as_millis()
                );
                self.notify();
                Ok(())
            }
            Err(source) => {
                let mirror_retained = match self.write_policy {
                    WritePolicy::Rollback => {
                        rollback(&mut *self.mirror.borrow_mut());
                        false
                    }
                    WritePolicy::KeepOptimistic => {
                        self.notify();
                        true
                    }
                };
                error!(
                    "event=collection_write module=store status=error collection={} op={op} duration_ms={} mirror_retained={} error_code={} error={}",
                    self.name,
                    started_at.elapsed().as_millis(),
                    mirror_retained,
                    source.code(),
                    source
                );
                Err(StoreError::Persist {
                    collection: self.name.clone(),
                    op,
                    source,
                    mirror_retained,
                })
            }
        }
    }

    fn notify(&self) {
        let snapshot = self.mirror.borrow().clone();
        self.listeners.notify(&snapshot);
    }
}

fn prepare_initial<T: Entity>(records: Vec<T>) -> StoreResult<Vec<T>> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .map(|mut record| {
            if record.id().trim().is_empty() {
                record.set_id(Uuid::new_v4().to_string());
            }
            record.validate()?;
            if !seen.insert(record.id().to_string()) {
                return Err(StoreError::DuplicateId(record.id().to_string()));
            }
            Ok(record)
        })
        .collect()
}

fn encode_record<T: Entity>(record: &T) -> StoreResult<StoredRecord> {
    let payload =
        serde_json::to_string(record).map_err(|err| StoreError::Serialization(err.to_string()))?;
    Ok(StoredRecord {
        id: record.id().to_string(),
        payload,
    })
}

/// Decodes stored rows, skipping rows that no longer match `T`.
fn decode_all<T: Entity>(collection: &str, rows: Vec<StoredRecord>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| {
            let decoded = serde_json::from_str::<T>(&row.payload)
                .map_err(|err| err.to_string())
                .and_then(|record| {
                    if record.id() != row.id {
                        return Err(format!("payload id `{}` differs from key", record.id()));
                    }
                    record.validate().map_err(|err| err.to_string())?;
                    Ok(record)
                });
            match decoded {
                Ok(record) => Some(record),
                Err(message) => {
                    warn!(
                        "event=collection_load module=store status=skipped collection={} id={} error_code=record_decode_failed error={}",
                        collection,
                        row.id,
                        crate::logging::sanitize_message(&message, 160)
                    );
                    None
                }
            }
        })
        .collect()
}
