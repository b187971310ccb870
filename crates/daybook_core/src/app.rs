//! Composition root owning the storage handle and shared stores.
//!
//! # Responsibility
//! - Open and close the process's storage handle.
//! - Hand out one shared store per (name, record type) and one preference
//!   cell per (key, value type).
//! - Dispatch preference changes made by other processes.
//!
//! # Invariants
//! - Repeated lookups of the same name and type return the same `Rc`.
//! - `initial_data` only matters on the first lookup of a collection.

use crate::config::StoreConfig;
use crate::model::habit::Habit;
use crate::model::planning::PlanningEvent;
use crate::model::task::Task;
use crate::model::Entity;
use crate::service::habit_service::HabitService;
use crate::service::planning_service::PlanningService;
use crate::service::task_service::TaskService;
use crate::storage::{StorageEvent, StorageHandle, StorageResult};
use crate::store::collection::CollectionStore;
use crate::store::preference::{ExternalChangeSink, PreferenceCell, PreferenceStore};
use crate::store::StoreResult;
use crate::theme::{ThemePreference, THEME_PREFERENCE_KEY};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const TASKS_COLLECTION: &str = "tasks";
pub const PLANNING_COLLECTION: &str = "planning";
pub const HABITS_COLLECTION: &str = "habits";

type RegistryKey = (String, TypeId);

/// Process-wide owner of stores built on one `StorageHandle`.
pub struct AppContext {
    handle: StorageHandle,
    preferences: PreferenceStore,
    collections: RefCell<HashMap<RegistryKey, Rc<dyn Any>>>,
    cells: RefCell<HashMap<RegistryKey, Rc<dyn Any>>>,
    sinks: RefCell<Vec<Rc<dyn ExternalChangeSink>>>,
}

impl AppContext {
    /// Opens storage per `config`; degrades to memory-only when unavailable.
    pub fn open(config: &StoreConfig) -> Self {
        Self::with_handle(StorageHandle::open(config))
    }

    pub fn with_handle(handle: StorageHandle) -> Self {
        let preferences = PreferenceStore::new(&handle);
        Self {
            handle,
            preferences,
            collections: RefCell::new(HashMap::new()),
            cells: RefCell::new(HashMap::new()),
            sinks: RefCell::new(Vec::new()),
        }
    }

    pub fn handle(&self) -> &StorageHandle {
        &self.handle
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    /// Returns the shared store for `name`, opening it on first use.
    pub fn collection<T: Entity>(
        &self,
        name: &str,
        initial_data: Vec<T>,
    ) -> StoreResult<Rc<CollectionStore<T>>> {
        let key = (name.to_string(), TypeId::of::<T>());
        if let Some(existing) = self.collections.borrow().get(&key) {
            if let Ok(store) = Rc::clone(existing).downcast::<CollectionStore<T>>() {
                return Ok(store);
            }
        }

        let store = Rc::new(CollectionStore::open(&self.handle, name, initial_data)?);
        self.collections
            .borrow_mut()
            .insert(key, Rc::clone(&store) as Rc<dyn Any>);
        Ok(store)
    }

    /// Returns the shared preference cell for `key`, creating it on first use.
    pub fn preference<T>(&self, key: &str, default: T) -> Rc<PreferenceCell<T>>
    where
        T: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
    {
        let registry_key = (key.to_string(), TypeId::of::<T>());
        if let Some(existing) = self.cells.borrow().get(&registry_key) {
            if let Ok(cell) = Rc::clone(existing).downcast::<PreferenceCell<T>>() {
                return cell;
            }
        }

        let cell = Rc::new(PreferenceCell::open(&self.preferences, key, default));
        self.cells
            .borrow_mut()
            .insert(registry_key, Rc::clone(&cell) as Rc<dyn Any>);
        self.sinks
            .borrow_mut()
            .push(Rc::clone(&cell) as Rc<dyn ExternalChangeSink>);
        cell
    }

    pub fn tasks(&self) -> StoreResult<TaskService> {
        Ok(TaskService::new(self.collection(TASKS_COLLECTION, Vec::<Task>::new())?))
    }

    pub fn planning(&self) -> StoreResult<PlanningService> {
        Ok(PlanningService::new(
            self.collection(PLANNING_COLLECTION, Vec::<PlanningEvent>::new())?,
        ))
    }

    pub fn habits(&self) -> StoreResult<HabitService> {
        Ok(HabitService::new(
            self.collection(HABITS_COLLECTION, Vec::<Habit>::new())?,
        ))
    }

    /// Stored theme preference, defaulting to `system`.
    pub fn theme_preference(&self) -> Rc<PreferenceCell<ThemePreference>> {
        self.preference(THEME_PREFERENCE_KEY, ThemePreference::System)
    }

    /// Delivers one external change to every cell registered for its key.
    ///
    /// Returns how many cells changed value.
    pub fn dispatch_external(&self, event: &StorageEvent) -> usize {
        let sinks: Vec<Rc<dyn ExternalChangeSink>> = self
            .sinks
            .borrow()
            .iter()
            .filter(|sink| sink.key() == event.key)
            .cloned()
            .collect();
        sinks
            .iter()
            .filter(|sink| sink.apply_external(event))
            .count()
    }

    /// Polls storage for preference writes made by other processes and
    /// dispatches them. Poll failures are logged and yield zero.
    pub fn sync_external_changes(&self) -> usize {
        let Ok(storage) = self.handle.storage() else {
            return 0;
        };
        match storage.poll_external_changes() {
            Ok(events) => {
                let applied = events
                    .iter()
                    .map(|event| self.dispatch_external(event))
                    .sum::<usize>();
                if !events.is_empty() {
                    info!(
                        "event=external_sync module=app status=ok events={} applied={}",
                        events.len(),
                        applied
                    );
                }
                applied
            }
            Err(err) => {
                warn!(
                    "event=external_sync module=app status=error error_code={} error={}",
                    err.code(),
                    err
                );
                0
            }
        }
    }

    /// Drops the registries and closes the storage handle.
    pub fn close(self) -> StorageResult<()> {
        self.sinks.borrow_mut().clear();
        self.cells.borrow_mut().clear();
        self.collections.borrow_mut().clear();
        self.handle.close()
    }
}
