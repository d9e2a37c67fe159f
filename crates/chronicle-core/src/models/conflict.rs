//! Scheduling conflict model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::event::EventId;
use super::user::UserId;

/// Where a detected conflict stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStatus {
    #[default]
    Pending,
    Resolved,
    Ignored,
}

impl ConflictStatus {
    /// Storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Resolved => "RESOLVED",
            Self::Ignored => "IGNORED",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "RESOLVED" => Ok(Self::Resolved),
            "IGNORED" => Ok(Self::Ignored),
            other => Err(Error::Validation(format!(
                "unknown conflict status '{other}'"
            ))),
        }
    }
}

/// Recorded time overlap between two events. Unique per ordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Row identifier
    pub id: i64,
    /// Event whose save detected the overlap
    pub event_id: EventId,
    pub conflicting_event_id: EventId,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
    pub resolution_status: ConflictStatus,
    pub resolution_notes: String,
    pub resolved_by: Option<UserId>,
    /// Resolution timestamp (Unix ms)
    pub resolved_at: Option<i64>,
}

impl Conflict {
    /// Whether the conflict involves `event_id` in either direction.
    pub fn involves(&self, event_id: &EventId) -> bool {
        self.event_id == *event_id || self.conflicting_event_id == *event_id
    }
}
