//! Planning use-case service over the `planning` collection.

use crate::model::planning::PlanningEvent;
use crate::model::{is_valid_date, RecordValidationError};
use crate::store::collection::CollectionStore;
use crate::store::{StoreError, StoreResult};
use serde::Serialize;
use std::rc::Rc;

#[derive(Serialize)]
struct ReschedulePatch<'a> {
    date: &'a str,
    time: Option<&'a str>,
    all_day: bool,
}

pub struct PlanningService {
    store: Rc<CollectionStore<PlanningEvent>>,
}

impl PlanningService {
    pub fn new(store: Rc<CollectionStore<PlanningEvent>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Rc<CollectionStore<PlanningEvent>> {
        &self.store
    }

    pub fn add_event(&self, event: PlanningEvent) -> StoreResult<PlanningEvent> {
        self.store.add(event)
    }

    /// Events on `date`: all-day events first, then by time, then insertion
    /// order.
    pub fn events_on(&self, date: &str) -> StoreResult<Vec<PlanningEvent>> {
        if !is_valid_date(date) {
            return Err(StoreError::Validation(RecordValidationError::InvalidDate {
                field: "date",
                value: date.to_string(),
            }));
        }
        let mut events: Vec<PlanningEvent> = self
            .store
            .list()
            .into_iter()
            .filter(|event| event.date == date)
            .collect();
        events.sort_by(|left, right| {
            right
                .all_day
                .cmp(&left.all_day)
                .then_with(|| left.time.cmp(&right.time))
        });
        Ok(events)
    }

    /// Moves an event; `time = None` makes it all-day.
    pub fn reschedule(
        &self,
        id: &str,
        date: &str,
        time: Option<&str>,
    ) -> StoreResult<PlanningEvent> {
        self.store.update(
            id,
            ReschedulePatch {
                date,
                time,
                all_day: time.is_none(),
            },
        )
    }

    pub fn remove_event(&self, id: &str) -> StoreResult<PlanningEvent> {
        self.store.remove(id)
    }
}
