//! Version model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::{EventId, EventSnapshot};
use super::user::UserId;
use crate::error::Result;

/// Immutable snapshot of an event, numbered per event starting at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Row identifier
    pub id: i64,
    pub event_id: EventId,
    /// Gapless per-event sequence number
    pub version_number: i64,
    /// Full event state after the mutation that produced this version
    pub data: Value,
    pub created_by: UserId,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Free-form reason supplied by the author
    pub change_reason: String,
}

impl Version {
    /// Decode the stored data into a typed snapshot.
    pub fn snapshot(&self) -> Result<EventSnapshot> {
        EventSnapshot::from_value(&self.data)
    }
}
