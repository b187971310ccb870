//! Task record.

use super::{check_date, now_epoch_ms, require_id, require_text, Entity, RecordValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Actionable task in the `tasks` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub due_date: Option<String>,
    pub completed: bool,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

impl Task {
    /// Creates a `todo` task with a generated id.
    pub fn new(title: impl Into<String>, priority: TaskPriority) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, priority)
    }

    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        priority: TaskPriority,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority,
            due_date: None,
            completed: false,
            created_at: now_epoch_ms(),
        }
    }
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), RecordValidationError> {
        require_id(&self.id)?;
        require_text("title", &self.title)?;
        if let Some(due_date) = self.due_date.as_deref() {
            check_date("due_date", due_date)?;
        }
        Ok(())
    }
}

/// Partial task update; `None` fields are left untouched.
///
/// `description` and `due_date` take `Some(None)` to clear the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Patch moving a task to `status`, keeping `completed` consistent.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            completed: Some(status == TaskStatus::Done),
            ..Self::default()
        }
    }
}
