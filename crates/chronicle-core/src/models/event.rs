//! Event model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::recurrence::RecurrencePattern;
use crate::util::{normalize_text_option, now_millis, truncate_to_millis};

use super::user::UserId;

const MAX_TITLE_CHARS: usize = 200;
const MAX_LOCATION_CHARS: usize = 200;

/// A unique identifier for an event, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new unique event ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A calendar event in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier
    pub id: EventId,
    pub title: String,
    pub description: String,
    /// Inclusive start of the event window
    pub start_time: DateTime<Utc>,
    /// Exclusive end of the event window
    pub end_time: DateTime<Utc>,
    pub location: String,
    /// Creator; always holds the Owner role
    pub created_by: UserId,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    pub is_recurring: bool,
    /// Pattern such as `FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE`
    pub recurrence_pattern: Option<String>,
    /// Current version number; equals the number of stored versions
    pub version: i64,
    /// Soft delete flag
    pub is_deleted: bool,
}

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<String>,
}

impl NewEvent {
    /// Minimal input: a title and a time window.
    pub fn new(
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            start_time,
            end_time,
            location: String::new(),
            is_recurring: false,
            recurrence_pattern: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_recurrence(mut self, pattern: impl Into<String>) -> Self {
        self.is_recurring = true;
        self.recurrence_pattern = Some(pattern.into());
        self
    }
}

/// Partial update of an event's content fields.
///
/// `None` leaves a field untouched. `recurrence_pattern: Some(None)` clears
/// the pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_recurring: Option<bool>,
    #[serde(default)]
    pub recurrence_pattern: Option<Option<String>>,
}

impl EventPatch {
    /// Whether the patch would change nothing.
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.location.is_none()
            && self.is_recurring.is_none()
            && self.recurrence_pattern.is_none()
    }
}

/// The full, serializable state of an event as stored in a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub created_by: UserId,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    pub version: i64,
}

impl EventSnapshot {
    /// Render the snapshot as a JSON object for storage and diffing.
    pub fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Database(format!(
                "event snapshot serialized to non-object: {other}"
            ))),
        }
    }

    /// Parse a stored snapshot back into its typed form.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }
}

impl Event {
    /// Build a version-1 event owned by `created_by`.
    pub fn new(input: NewEvent, created_by: UserId) -> Self {
        let now = now_millis();
        Self {
            id: EventId::new(),
            title: input.title.trim().to_string(),
            description: input.description,
            start_time: truncate_to_millis(input.start_time),
            end_time: truncate_to_millis(input.end_time),
            location: input.location.trim().to_string(),
            created_by,
            created_at: now,
            updated_at: now,
            is_recurring: input.is_recurring,
            recurrence_pattern: normalize_text_option(input.recurrence_pattern),
            version: 1,
            is_deleted: false,
        }
    }

    /// Apply a partial update to the content fields.
    ///
    /// Identity and audit fields are not touched; callers bump `version` and
    /// `updated_at` themselves.
    pub fn apply_patch(&mut self, patch: EventPatch) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(start_time) = patch.start_time {
            self.start_time = truncate_to_millis(start_time);
        }
        if let Some(end_time) = patch.end_time {
            self.end_time = truncate_to_millis(end_time);
        }
        if let Some(location) = patch.location {
            self.location = location.trim().to_string();
        }
        if let Some(is_recurring) = patch.is_recurring {
            self.is_recurring = is_recurring;
        }
        if let Some(pattern) = patch.recurrence_pattern {
            self.recurrence_pattern = normalize_text_option(pattern);
        }
    }

    /// Overwrite the content fields from a stored snapshot.
    ///
    /// `id`, `created_by`, `created_at`, `updated_at` and `version` are kept.
    pub fn restore_from(&mut self, snapshot: &EventSnapshot) {
        self.title.clone_from(&snapshot.title);
        self.description.clone_from(&snapshot.description);
        self.start_time = truncate_to_millis(snapshot.start_time);
        self.end_time = truncate_to_millis(snapshot.end_time);
        self.location.clone_from(&snapshot.location);
        self.is_recurring = snapshot.is_recurring;
        self.recurrence_pattern.clone_from(&snapshot.recurrence_pattern);
    }

    /// Capture the current state.
    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location.clone(),
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_recurring: self.is_recurring,
            recurrence_pattern: self.recurrence_pattern.clone(),
            version: self.version,
        }
    }

    /// Check every content invariant, reporting all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.title.trim().is_empty() {
            problems.push("title is required".to_string());
        } else if self.title.chars().count() > MAX_TITLE_CHARS {
            problems.push(format!("title cannot exceed {MAX_TITLE_CHARS} characters"));
        }
        if self.location.chars().count() > MAX_LOCATION_CHARS {
            problems.push(format!(
                "location cannot exceed {MAX_LOCATION_CHARS} characters"
            ));
        }
        if self.start_time >= self.end_time {
            problems.push("end_time must be after start_time".to_string());
        }
        if self.is_recurring {
            match self.recurrence_pattern.as_deref() {
                None => problems.push("recurring events need a recurrence_pattern".to_string()),
                Some(raw) => {
                    let pattern = RecurrencePattern::parse(raw);
                    if let Err(error) = pattern.frequency().and_then(|_| pattern.interval()) {
                        problems.push(error.to_string());
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems.join("; ")))
        }
    }

    /// Open-interval overlap: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        other.start_time < self.end_time && other.end_time > self.start_time
    }
}
