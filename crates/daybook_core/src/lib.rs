//! Core persistence for Daybook: typed collections, preferences and theme.
//! This crate is the single source of truth for stored-state invariants.

pub mod app;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;
pub mod store;
pub mod theme;

pub use app::{AppContext, HABITS_COLLECTION, PLANNING_COLLECTION, TASKS_COLLECTION};
pub use config::{ConfigError, StoreConfig, WritePolicy};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::habit::{Habit, HabitFrequency};
pub use model::planning::PlanningEvent;
pub use model::task::{Task, TaskPatch, TaskPriority, TaskStatus};
pub use model::{Entity, RecordValidationError};
pub use service::habit_service::HabitService;
pub use service::planning_service::PlanningService;
pub use service::task_service::{NewTask, TaskService};
pub use storage::{
    DurableStorage, SqliteStorage, StorageError, StorageEvent, StorageHandle, StorageResult,
    StoredRecord,
};
pub use store::collection::CollectionStore;
pub use store::listeners::ListenerId;
pub use store::preference::{ExternalChangeSink, PreferenceCell, PreferenceStore, Update};
pub use store::{StoreError, StoreResult};
pub use theme::{
    resolve_theme, ClassList, ClassListApplier, EffectiveTheme, SystemTheme, SystemThemeSignal,
    SystemThemeSource, ThemeApplier, ThemeController, ThemePreference,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
