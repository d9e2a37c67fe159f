//! User and actor models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// A unique identifier for a user, using UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new unique user ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID.
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A registered user that events can be owned by or shared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,
    /// Unique login name
    pub username: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl User {
    /// Create a new user with a trimmed, non-empty username.
    pub fn new(username: impl Into<String>) -> Result<Self> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(Error::Validation("username cannot be empty".to_string()));
        }
        if username.chars().count() > 150 {
            return Err(Error::Validation(
                "username cannot exceed 150 characters".to_string(),
            ));
        }

        Ok(Self {
            id: UserId::new(),
            username,
            created_at: chrono::Utc::now().timestamp_millis(),
        })
    }
}

/// The authenticated identity on whose behalf an operation runs.
///
/// Administrators bypass every role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    /// A regular user, subject to per-event roles.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    /// An administrative actor.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }
}
