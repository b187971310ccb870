//! Feature use-case services.
//!
//! # Responsibility
//! - Turn feature intents (complete a task, check in a habit) into
//!   collection store operations.
//! - Keep presentation callers decoupled from record patching details.
//!
//! # Invariants
//! - Services never bypass `CollectionStore` validation or write policy.

pub mod habit_service;
pub mod planning_service;
pub mod task_service;
