//! Planning calendar event record.

use super::{
    check_color, check_date, is_valid_time, require_id, require_text, Entity,
    RecordValidationError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event in the `planning` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningEvent {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM`; absent for all-day events.
    #[serde(default)]
    pub time: Option<String>,
    pub all_day: bool,
    #[serde(default)]
    pub category: Option<String>,
    /// `#RRGGBB`.
    #[serde(default)]
    pub color: Option<String>,
}

impl PlanningEvent {
    /// Creates an all-day event with a generated id.
    pub fn all_day(title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            date: date.into(),
            time: None,
            all_day: true,
            category: None,
            color: None,
        }
    }

    /// Creates an event at a clock time with a generated id.
    pub fn at(title: impl Into<String>, date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            time: Some(time.into()),
            all_day: false,
            ..Self::all_day(title, date)
        }
    }
}

impl Entity for PlanningEvent {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), RecordValidationError> {
        require_id(&self.id)?;
        require_text("title", &self.title)?;
        check_date("date", &self.date)?;
        match self.time.as_deref() {
            Some(_) if self.all_day => return Err(RecordValidationError::TimedAllDayEvent),
            Some(time) if !is_valid_time(time) => {
                return Err(RecordValidationError::InvalidTime(time.to_string()))
            }
            _ => {}
        }
        check_color(self.color.as_deref())
    }
}
