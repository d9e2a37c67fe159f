//! Change log model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::event::EventId;
use super::user::UserId;

/// Kind of semantic action recorded in the change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Create,
    /// Content change, including rollbacks
    Update,
    /// Soft delete
    Delete,
    Share,
    /// A grant was revoked
    PermissionChange,
}

impl ChangeType {
    /// Storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Share => "SHARE",
            Self::PermissionChange => "PERMISSION_CHANGE",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "SHARE" => Ok(Self::Share),
            "PERMISSION_CHANGE" => Ok(Self::PermissionChange),
            other => Err(Error::Database(format!("unknown change type '{other}'"))),
        }
    }
}

/// One audit record, tied to the version that was current when it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Row identifier
    pub id: i64,
    pub event_id: EventId,
    /// Row id of the referenced version
    pub version_id: i64,
    pub change_type: ChangeType,
    pub changed_by: UserId,
    /// Timestamp (Unix ms)
    pub changed_at: i64,
    /// Machine-readable description of the change
    pub changes: Value,
    /// Free-form JSON object
    pub metadata: Value,
}

/// Input for appending a change log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChangeLogEntry {
    pub event_id: EventId,
    pub version_id: i64,
    pub change_type: ChangeType,
    pub changed_by: UserId,
    pub changes: Value,
    pub metadata: Value,
}

impl NewChangeLogEntry {
    pub fn new(
        event_id: EventId,
        version_id: i64,
        change_type: ChangeType,
        changed_by: UserId,
        changes: Value,
    ) -> Self {
        Self {
            event_id,
            version_id,
            change_type,
            changed_by,
            changes,
            metadata: Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
