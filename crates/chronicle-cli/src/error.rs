use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] chronicle_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No acting user. Pass --as <USER_ID> or set CHRONICLE_USER")]
    MissingActor,
    #[error("Invalid {kind} ID: {value}")]
    InvalidId { kind: &'static str, value: String },
    #[error("Invalid time '{0}'. Use RFC 3339 or \"YYYY-MM-DD HH:MM\" (UTC)")]
    InvalidTime(String),
    #[error("Invalid grant '{0}'. Use USER_ID or USER_ID:ROLE")]
    InvalidGrant(String),
    #[error("Batch input must be a JSON array of events: {0}")]
    InvalidBatch(String),
}
