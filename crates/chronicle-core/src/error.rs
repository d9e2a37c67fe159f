//! Error types for chronicle-core

use std::fmt;

use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

/// Result type alias using chronicle-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in chronicle-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before anything was persisted
    #[error("Validation error: {0}")]
    Validation(String),

    /// Event, version, user or conflict absent (or not visible to the actor)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Actor can see the event but lacks the role for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation or a write that kept losing races
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another writer already claimed this version number
    #[error("Version {version_number} of event {event_id} already exists")]
    VersionTaken {
        event_id: String,
        version_number: i64,
    },

    /// Recurrence pattern cannot be expanded
    #[error("Invalid recurrence pattern: {0}")]
    InvalidRecurrence(String),

    /// One or more items of a batch failed validation
    #[error("Batch rejected: {}", format_batch_errors(.0))]
    Batch(Vec<BatchItemError>),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether a fresh transaction may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::VersionTaken { .. } => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// A single rejected item of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemError {
    /// Position of the item in the submitted batch
    pub index: usize,
    /// Why the item was rejected
    pub message: String,
}

impl fmt::Display for BatchItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {}: {}", self.index, self.message)
    }
}

fn format_batch_errors(errors: &[BatchItemError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Returns true when a SQLite error is a UNIQUE/PRIMARY KEY violation.
pub(crate) fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
    )
}
