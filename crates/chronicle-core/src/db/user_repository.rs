//! User repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use super::parse_column;
use crate::error::{is_unique_violation, Error, Result};
use crate::models::{User, UserId};

/// Trait for user storage operations
pub trait UserRepository {
    /// Register a new user; usernames are unique (case-insensitive)
    fn create(&self, username: &str) -> Result<User>;

    /// Get a user by ID
    fn get(&self, id: &UserId) -> Result<Option<User>>;

    /// Get a user by username
    fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Whether a user exists
    fn exists(&self, id: &UserId) -> Result<bool>;
}

/// `SQLite` implementation of `UserRepository`
pub struct SqliteUserRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteUserRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: parse_column(row, 0)?,
            username: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create(&self, username: &str) -> Result<User> {
        let user = User::new(username)?;

        self.conn
            .execute(
                "INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)",
                params![user.id.as_str(), user.username, user.created_at],
            )
            .map_err(|error| {
                if is_unique_violation(&error) {
                    Error::Conflict(format!("username '{}' is already taken", user.username))
                } else {
                    error.into()
                }
            })?;

        Ok(user)
    }

    fn get(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE id = ?",
                params![id.as_str()],
                Self::parse_user,
            )
            .optional()?)
    }

    fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE username = ? COLLATE NOCASE",
                params![username.trim()],
                Self::parse_user,
            )
            .optional()?)
    }

    fn exists(&self, id: &UserId) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)",
            params![id.as_str()],
            |row| row.get(0),
        )?)
    }
}
