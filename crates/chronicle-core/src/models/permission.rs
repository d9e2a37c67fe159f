//! Permission model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::event::EventId;
use super::user::UserId;

/// Role a user holds on one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full control; created automatically for the event's creator
    Owner,
    /// May read and modify the event
    Editor,
    /// Read-only access
    #[default]
    Viewer,
}

impl Role {
    /// Storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Editor => "EDITOR",
            Self::Viewer => "VIEWER",
        }
    }

    /// Whether this role may modify the event.
    pub const fn can_write(self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OWNER" => Ok(Self::Owner),
            "EDITOR" => Ok(Self::Editor),
            "VIEWER" => Ok(Self::Viewer),
            other => Err(Error::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// A user's role on an event. Unique per (event, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Row identifier
    pub id: i64,
    pub event_id: EventId,
    pub user_id: UserId,
    pub role: Role,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last role change (Unix ms)
    pub updated_at: i64,
}

/// A requested role for one user, as submitted when creating or sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub user_id: UserId,
    #[serde(default)]
    pub role: Role,
}

impl PermissionGrant {
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}
