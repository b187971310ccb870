//! Task use-case service over the `tasks` collection.
//!
//! # Invariants
//! - Status changes always keep `completed` consistent with `done`.

use crate::model::task::{Task, TaskPatch, TaskPriority, TaskStatus};
use crate::store::collection::CollectionStore;
use crate::store::{StoreError, StoreResult};
use std::rc::Rc;

/// Request model for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    /// `YYYY-MM-DD`.
    pub due_date: Option<String>,
}

/// Task service facade over a shared collection store.
pub struct TaskService {
    store: Rc<CollectionStore<Task>>,
}

impl TaskService {
    pub fn new(store: Rc<CollectionStore<Task>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Rc<CollectionStore<Task>> {
        &self.store
    }

    /// Creates a `todo` task with a generated id.
    pub fn create_task(&self, request: NewTask) -> StoreResult<Task> {
        let mut task = Task::new(request.title, request.priority);
        task.description = request.description;
        task.due_date = request.due_date;
        self.store.add(task)
    }

    pub fn set_status(&self, id: &str, status: TaskStatus) -> StoreResult<Task> {
        self.store.update(id, TaskPatch::status(status))
    }

    /// Flips between `done` and `todo`.
    pub fn toggle_complete(&self, id: &str) -> StoreResult<Task> {
        let current = self
            .store
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let next = if current.completed {
            TaskStatus::Todo
        } else {
            TaskStatus::Done
        };
        self.set_status(id, next)
    }

    /// Sets the due date, or clears it with `None`.
    pub fn set_due_date(&self, id: &str, due_date: Option<&str>) -> StoreResult<Task> {
        self.store.update(
            id,
            TaskPatch {
                due_date: Some(due_date.map(str::to_string)),
                ..TaskPatch::default()
            },
        )
    }

    pub fn delete_task(&self, id: &str) -> StoreResult<Task> {
        self.store.remove(id)
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<Task> {
        self.store
            .list()
            .into_iter()
            .filter(|task| task.status == status)
            .collect()
    }

    /// Open tasks ordered by priority (high first), then due date (undated
    /// last), then insertion order.
    pub fn open_tasks_by_priority(&self) -> Vec<Task> {
        let mut open: Vec<Task> = self
            .store
            .list()
            .into_iter()
            .filter(|task| !task.completed)
            .collect();
        open.sort_by(|left, right| {
            right.priority.cmp(&left.priority).then_with(|| {
                match (left.due_date.as_deref(), right.due_date.as_deref()) {
                    (Some(l), Some(r)) => l.cmp(r),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
            })
        });
        open
    }
}
