//! Version store: immutable, numbered snapshots of each event

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::parse_column;
use crate::error::{is_unique_violation, Error, Result};
use crate::models::{Event, EventId, UserId, Version};
use crate::util::now_millis;

const VERSION_COLUMNS: &str =
    "id, event_id, version_number, data, created_by, created_at, change_reason";

/// Trait for version storage operations
///
/// Versions are append-only; there is no update or delete.
pub trait VersionRepository {
    /// Snapshot `event` as version `event.version`
    fn record(&self, event: &Event, author: &UserId, reason: &str) -> Result<Version>;

    /// Store `data` as version `number` of the event.
    ///
    /// Fails with [`Error::VersionTaken`] if that number already exists.
    fn insert(
        &self,
        event_id: &EventId,
        number: i64,
        data: &Value,
        author: &UserId,
        reason: &str,
    ) -> Result<Version>;

    /// A specific version; `NotFound` if absent
    fn get(&self, event_id: &EventId, number: i64) -> Result<Version>;

    /// The highest-numbered version
    fn latest(&self, event_id: &EventId) -> Result<Option<Version>>;

    /// All versions, newest first
    fn list(&self, event_id: &EventId) -> Result<Vec<Version>>;

    /// Number of stored versions
    fn count(&self, event_id: &EventId) -> Result<i64>;
}

/// `SQLite` implementation of `VersionRepository`
pub struct SqliteVersionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteVersionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<Version> {
        Ok(Version {
            id: row.get(0)?,
            event_id: parse_column(row, 1)?,
            version_number: row.get(2)?,
            data: row.get(3)?,
            created_by: parse_column(row, 4)?,
            created_at: row.get(5)?,
            change_reason: row.get(6)?,
        })
    }
}

impl VersionRepository for SqliteVersionRepository<'_> {
    fn record(&self, event: &Event, author: &UserId, reason: &str) -> Result<Version> {
        let data = Value::Object(event.snapshot().to_map()?);
        self.insert(&event.id, event.version, &data, author, reason)
    }

    fn insert(
        &self,
        event_id: &EventId,
        number: i64,
        data: &Value,
        author: &UserId,
        reason: &str,
    ) -> Result<Version> {
        let now = now_millis();
        let result = self.conn.query_row(
            &format!(
                "INSERT INTO event_versions
                     (event_id, version_number, data, created_by, created_at, change_reason)
                 VALUES (?, ?, ?, ?, ?, ?)
                 RETURNING {VERSION_COLUMNS}"
            ),
            params![
                event_id.as_str(),
                number,
                data,
                author.as_str(),
                now,
                reason
            ],
            Self::parse_version,
        );

        match result {
            Ok(version) => {
                tracing::debug!("Stored version {} of event {}", number, event_id);
                Ok(version)
            }
            Err(error) if is_unique_violation(&error) => Err(Error::VersionTaken {
                event_id: event_id.as_str(),
                version_number: number,
            }),
            Err(error) => Err(error.into()),
        }
    }

    fn get(&self, event_id: &EventId, number: i64) -> Result<Version> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM event_versions
                     WHERE event_id = ? AND version_number = ?"
                ),
                params![event_id.as_str(), number],
                Self::parse_version,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("version {number} of event {event_id}")))
    }

    fn latest(&self, event_id: &EventId) -> Result<Option<Version>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM event_versions
                     WHERE event_id = ? ORDER BY version_number DESC LIMIT 1"
                ),
                params![event_id.as_str()],
                Self::parse_version,
            )
            .optional()?)
    }

    fn list(&self, event_id: &EventId) -> Result<Vec<Version>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM event_versions
             WHERE event_id = ? ORDER BY version_number DESC"
        ))?;
        let versions = stmt
            .query_map(params![event_id.as_str()], Self::parse_version)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    fn count(&self, event_id: &EventId) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM event_versions WHERE event_id = ?",
            params![event_id.as_str()],
            |row| row.get(0),
        )?)
    }
}
