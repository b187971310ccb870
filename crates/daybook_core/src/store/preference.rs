//! Scalar preference persistence and observable preference cells.
//!
//! # Responsibility
//! - Read and write single named values, never raising to the caller.
//! - Keep an observable in-process value per key and fold in changes made by
//!   other processes.
//!
//! # Invariants
//! - `read` always yields a value: stored, or the caller's default.
//! - `PreferenceCell::set` updates local state before the durable write.
//! - Events stamped with this process's origin are ignored.

use super::listeners::{ListenerId, Listeners};
use crate::storage::{DurableStorage, StorageEvent, StorageHandle};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// New value for a preference: a literal, or a function of the previous one.
pub enum Update<T> {
    Literal(T),
    Updater(Box<dyn FnOnce(&T) -> T>),
}

impl<T> Update<T> {
    pub fn updater(update: impl FnOnce(&T) -> T + 'static) -> Self {
        Self::Updater(Box::new(update))
    }

    fn apply(self, previous: &T) -> T {
        match self {
            Self::Literal(value) => value,
            Self::Updater(update) => update(previous),
        }
    }
}

impl<T> From<T> for Update<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

/// Key-value access to persisted preferences.
#[derive(Clone)]
pub struct PreferenceStore {
    storage: Option<Rc<dyn DurableStorage>>,
}

impl PreferenceStore {
    pub fn new(handle: &StorageHandle) -> Self {
        Self {
            storage: handle.storage().ok(),
        }
    }

    /// Origin id of this process, when durable storage is available.
    pub fn origin(&self) -> Option<&str> {
        self.storage.as_deref().map(|storage| storage.origin())
    }

    /// Returns the stored value for `key`, or `default` when it is missing,
    /// undecodable or unreadable.
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(storage) = self.storage.as_deref() else {
            return default;
        };
        match storage.get_preference(key) {
            Ok(Some(raw)) => decode_or_default(key, Some(&raw), default),
            Ok(None) => default,
            Err(err) => {
                warn!(
                    "event=preference_read module=store status=error key={} error_code={} error={}",
                    key,
                    err.code(),
                    err
                );
                default
            }
        }
    }

    /// Serializes and persists `value`. Failures are logged only.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        let Some(storage) = self.storage.as_deref() else {
            debug!("event=preference_write module=store status=degraded key={key}");
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "event=preference_write module=store status=error key={} error_code=preference_encode_failed error={}",
                    key, err
                );
                return;
            }
        };
        if let Err(err) = storage.set_preference(key, Some(&raw)) {
            warn!(
                "event=preference_write module=store status=error key={} error_code={} error={}",
                key,
                err.code(),
                err
            );
        }
    }
}

/// Receiver of preference changes made by other processes.
pub trait ExternalChangeSink {
    fn key(&self) -> &str;
    /// Applies `event`; returns `true` when the local value changed.
    fn apply_external(&self, event: &StorageEvent) -> bool;
}

/// Observable persisted value for one key.
pub struct PreferenceCell<T> {
    key: String,
    default: T,
    store: PreferenceStore,
    value: RefCell<T>,
    listeners: Listeners<T>,
}

impl<T> PreferenceCell<T>
where
    T: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
{
    /// Creates the cell with the currently stored value.
    pub fn open(store: &PreferenceStore, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let value = store.read(&key, default.clone());
        Self {
            key,
            default,
            store: store.clone(),
            value: RefCell::new(value),
            listeners: Listeners::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Sets the value, notifies listeners, then persists it.
    ///
    /// Returns the new value.
    pub fn set(&self, update: impl Into<Update<T>>) -> T {
        let next = {
            let current = self.value.borrow().clone();
            update.into().apply(&current)
        };
        *self.value.borrow_mut() = next.clone();
        self.listeners.notify(&next);
        self.store.write(&self.key, &next);
        next
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl<T> ExternalChangeSink for PreferenceCell<T>
where
    T: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
{
    fn key(&self) -> &str {
        &self.key
    }

    fn apply_external(&self, event: &StorageEvent) -> bool {
        if event.key != self.key || self.store.origin() == Some(event.origin.as_str()) {
            return false;
        }

        let next = decode_or_default(&self.key, event.new_value.as_deref(), self.default.clone());
        if *self.value.borrow() == next {
            return false;
        }
        *self.value.borrow_mut() = next.clone();
        debug!(
            "event=preference_external module=store status=ok key={} origin={}",
            self.key, event.origin
        );
        self.listeners.notify(&next);
        true
    }
}

fn decode_or_default<T: DeserializeOwned>(key: &str, raw: Option<&str>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                "event=preference_decode module=store status=fallback key={} error_code=preference_decode_failed error={}",
                key, err
            );
            default
        }
    }
}
