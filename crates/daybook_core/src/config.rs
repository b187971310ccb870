//! Runtime configuration for the storage composition root.
//!
//! # Responsibility
//! - Describe where durable data lives and how write failures are handled.
//! - Load configuration from a JSON file with per-field defaults.
//!
//! # Invariants
//! - `busy_timeout_ms` is always within `BUSY_TIMEOUT_MIN_MS..=BUSY_TIMEOUT_MAX_MS`
//!   after `normalized()`.
//! - A missing field never fails loading; it takes its default.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const BUSY_TIMEOUT_MIN_MS: u64 = 100;
pub const BUSY_TIMEOUT_MAX_MS: u64 = 60_000;

/// What a collection store does with its mirror when a durable write fails.
///
/// Both policies report the failure to the caller as `StoreError::Persist`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Restore the mirror to its state before the failed mutation.
    #[default]
    Rollback,
    /// Keep the optimistic mirror change for the rest of the session.
    KeepOptimistic,
}

/// Storage and logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file path. `None` keeps everything in an in-memory database.
    pub db_path: Option<PathBuf>,
    /// Upper bound for one durable operation waiting on a locked database.
    pub busy_timeout_ms: u64,
    pub write_policy: WritePolicy,
    pub log_level: String,
    /// Absolute log directory. `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            write_policy: WritePolicy::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Config persisting to `path` with every other field defaulted.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads a JSON config file and normalizes it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        Self::from_json(&raw)
    }

    /// Parses a JSON config document and normalizes it.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        Ok(config.normalized())
    }

    /// Clamps out-of-range values into their supported range.
    pub fn normalized(mut self) -> Self {
        self.busy_timeout_ms = self
            .busy_timeout_ms
            .clamp(BUSY_TIMEOUT_MIN_MS, BUSY_TIMEOUT_MAX_MS);
        if self.log_level.trim().is_empty() {
            self.log_level = default_log_level().to_string();
        }
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}
