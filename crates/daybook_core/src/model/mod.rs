//! Entity records stored in persisted collections.
//!
//! # Responsibility
//! - Define the `Entity` contract every collection record implements.
//! - Define the task, planning-event and habit record shapes.
//! - Share field validators (calendar date, clock time, hex color).
//!
//! # Invariants
//! - Every stored record has a non-empty string id.
//! - Records entering a collection have passed `Entity::validate`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod habit;
pub mod planning;
pub mod task;

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("valid date regex")
});
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time regex"));
static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));

/// Record that can live in a `CollectionStore`.
///
/// Serialized field names are the persisted shape; `update` patches are
/// merged against them.
pub trait Entity: Clone + Serialize + DeserializeOwned + 'static {
    fn id(&self) -> &str;

    /// Replaces the id. Used only when the store generates one on `add`.
    fn set_id(&mut self, id: String);

    /// Checks domain rules before the record enters the mirror.
    fn validate(&self) -> Result<(), RecordValidationError> {
        require_id(self.id())
    }
}

/// Domain rule violations for collection records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    EmptyId,
    EmptyField(&'static str),
    InvalidDate { field: &'static str, value: String },
    InvalidTime(String),
    InvalidColor(String),
    /// All-day events cannot carry a clock time.
    TimedAllDayEvent,
    DuplicateCompletionDate(String),
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "record id cannot be empty"),
            Self::EmptyField(field) => write!(f, "`{field}` cannot be empty"),
            Self::InvalidDate { field, value } => {
                write!(f, "`{field}` must be YYYY-MM-DD, got `{value}`")
            }
            Self::InvalidTime(value) => write!(f, "time must be HH:MM, got `{value}`"),
            Self::InvalidColor(value) => write!(f, "color must be #RRGGBB, got `{value}`"),
            Self::TimedAllDayEvent => write!(f, "all-day events cannot have a time"),
            Self::DuplicateCompletionDate(date) => {
                write!(f, "completion date `{date}` is listed more than once")
            }
        }
    }
}

impl Error for RecordValidationError {}

pub(crate) fn require_id(id: &str) -> Result<(), RecordValidationError> {
    if id.trim().is_empty() {
        return Err(RecordValidationError::EmptyId);
    }
    Ok(())
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), RecordValidationError> {
    if value.trim().is_empty() {
        return Err(RecordValidationError::EmptyField(field));
    }
    Ok(())
}

/// Returns whether `value` is a `YYYY-MM-DD` calendar date.
///
/// Month lengths are not checked (`2025-02-31` passes).
pub fn is_valid_date(value: &str) -> bool {
    DATE_RE.is_match(value)
}

/// Returns whether `value` is a 24h `HH:MM` time.
pub fn is_valid_time(value: &str) -> bool {
    TIME_RE.is_match(value)
}

pub fn is_valid_color(value: &str) -> bool {
    COLOR_RE.is_match(value)
}

pub(crate) fn check_date(field: &'static str, value: &str) -> Result<(), RecordValidationError> {
    if !is_valid_date(value) {
        return Err(RecordValidationError::InvalidDate {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_color(value: Option<&str>) -> Result<(), RecordValidationError> {
    match value {
        Some(color) if !is_valid_color(color) => {
            Err(RecordValidationError::InvalidColor(color.to_string()))
        }
        _ => Ok(()),
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
