//! Habit use-case service over the `habits` collection.
//!
//! # Invariants
//! - `completed_dates` stays sorted ascending and duplicate-free.

use crate::model::habit::{Habit, HabitFrequency};
use crate::model::{is_valid_date, RecordValidationError};
use crate::store::collection::CollectionStore;
use crate::store::{StoreError, StoreResult};
use serde::Serialize;
use std::rc::Rc;

#[derive(Serialize)]
struct CompletionPatch {
    completed_dates: Vec<String>,
}

pub struct HabitService {
    store: Rc<CollectionStore<Habit>>,
}

impl HabitService {
    pub fn new(store: Rc<CollectionStore<Habit>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Rc<CollectionStore<Habit>> {
        &self.store
    }

    pub fn create_habit(
        &self,
        name: impl Into<String>,
        frequency: HabitFrequency,
    ) -> StoreResult<Habit> {
        self.store.add(Habit::new(name, frequency))
    }

    /// Marks the habit done on `date`. Checking in twice is a no-op.
    pub fn check_in(&self, id: &str, date: &str) -> StoreResult<Habit> {
        self.edit_dates(id, date, |dates| {
            if let Err(at) = dates.binary_search_by(|done| done.as_str().cmp(date)) {
                dates.insert(at, date.to_string());
            }
        })
    }

    /// Removes the completion on `date`, if any.
    pub fn undo_check_in(&self, id: &str, date: &str) -> StoreResult<Habit> {
        self.edit_dates(id, date, |dates| dates.retain(|done| done != date))
    }

    pub fn completion_count(&self, id: &str) -> StoreResult<usize> {
        self.store
            .get(id)
            .map(|habit| habit.completed_dates.len())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn edit_dates(
        &self,
        id: &str,
        date: &str,
        edit: impl FnOnce(&mut Vec<String>),
    ) -> StoreResult<Habit> {
        if !is_valid_date(date) {
            return Err(StoreError::Validation(RecordValidationError::InvalidDate {
                field: "completed_dates",
                value: date.to_string(),
            }));
        }
        let habit = self
            .store
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut completed_dates = habit.completed_dates;
        completed_dates.sort();
        completed_dates.dedup();
        edit(&mut completed_dates);
        self.store.update(id, CompletionPatch { completed_dates })
    }
}
