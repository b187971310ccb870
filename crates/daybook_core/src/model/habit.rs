//! Habit record with its completion history.

use super::{check_color, check_date, require_id, require_text, Entity, RecordValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitFrequency {
    #[default]
    Daily,
    Weekly,
}

/// Habit in the `habits` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub frequency: HabitFrequency,
    /// `YYYY-MM-DD` dates, each at most once. Kept ascending by `HabitService`.
    #[serde(default)]
    pub completed_dates: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Habit {
    pub fn new(name: impl Into<String>, frequency: HabitFrequency) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            frequency,
            completed_dates: Vec::new(),
            color: None,
        }
    }

    pub fn is_done_on(&self, date: &str) -> bool {
        self.completed_dates.iter().any(|done| done == date)
    }
}

impl Entity for Habit {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), RecordValidationError> {
        require_id(&self.id)?;
        require_text("name", &self.name)?;
        let mut seen = BTreeSet::new();
        for date in &self.completed_dates {
            check_date("completed_dates", date)?;
            if !seen.insert(date.as_str()) {
                return Err(RecordValidationError::DuplicateCompletionDate(date.clone()));
            }
        }
        check_color(self.color.as_deref())
    }
}
