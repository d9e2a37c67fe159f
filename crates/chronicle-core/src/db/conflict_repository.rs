//! Conflict record repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_column, parse_optional_column};
use crate::error::{Error, Result};
use crate::models::{Conflict, ConflictStatus, EventId, UserId};
use crate::util::now_millis;

const CONFLICT_COLUMNS: &str = "id, event_id, conflicting_event_id, detected_at, \
     resolution_status, resolution_notes, resolved_by, resolved_at";

/// Trait for overlap records between pairs of events
pub trait ConflictRepository {
    /// Whether the ordered pair `(event_id, conflicting_event_id)` is recorded
    fn exists(&self, event_id: &EventId, conflicting_event_id: &EventId) -> Result<bool>;

    /// Record a new pending conflict for the ordered pair
    fn insert(&self, event_id: &EventId, conflicting_event_id: &EventId) -> Result<Conflict>;

    /// Get a conflict by ID
    fn get(&self, id: i64) -> Result<Option<Conflict>>;

    /// Conflicts naming the event on either side, most recent first
    fn list_for_event(&self, event_id: &EventId) -> Result<Vec<Conflict>>;

    /// Set the resolution of a conflict
    fn resolve(
        &self,
        id: i64,
        status: ConflictStatus,
        notes: &str,
        resolved_by: &UserId,
    ) -> Result<Conflict>;
}

/// `SQLite` implementation of `ConflictRepository`
pub struct SqliteConflictRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConflictRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conflict> {
        Ok(Conflict {
            id: row.get(0)?,
            event_id: parse_column(row, 1)?,
            conflicting_event_id: parse_column(row, 2)?,
            detected_at: row.get(3)?,
            resolution_status: parse_column(row, 4)?,
            resolution_notes: row.get(5)?,
            resolved_by: parse_optional_column(row, 6)?,
            resolved_at: row.get(7)?,
        })
    }
}

impl ConflictRepository for SqliteConflictRepository<'_> {
    fn exists(&self, event_id: &EventId, conflicting_event_id: &EventId) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM event_conflicts
                 WHERE event_id = ? AND conflicting_event_id = ?)",
            params![event_id.as_str(), conflicting_event_id.as_str()],
            |row| row.get(0),
        )?)
    }

    fn insert(&self, event_id: &EventId, conflicting_event_id: &EventId) -> Result<Conflict> {
        Ok(self.conn.query_row(
            &format!(
                "INSERT INTO event_conflicts (event_id, conflicting_event_id, detected_at)
                 VALUES (?, ?, ?)
                 RETURNING {CONFLICT_COLUMNS}"
            ),
            params![event_id.as_str(), conflicting_event_id.as_str(), now_millis()],
            Self::parse_conflict,
        )?)
    }

    fn get(&self, id: i64) -> Result<Option<Conflict>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {CONFLICT_COLUMNS} FROM event_conflicts WHERE id = ?"),
                params![id],
                Self::parse_conflict,
            )
            .optional()?)
    }

    fn list_for_event(&self, event_id: &EventId) -> Result<Vec<Conflict>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONFLICT_COLUMNS} FROM event_conflicts
             WHERE event_id = ?1 OR conflicting_event_id = ?1
             ORDER BY detected_at DESC, id DESC"
        ))?;
        let conflicts = stmt
            .query_map(params![event_id.as_str()], Self::parse_conflict)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(conflicts)
    }

    fn resolve(
        &self,
        id: i64,
        status: ConflictStatus,
        notes: &str,
        resolved_by: &UserId,
    ) -> Result<Conflict> {
        self.conn
            .query_row(
                &format!(
                    "UPDATE event_conflicts
                     SET resolution_status = ?, resolution_notes = ?, resolved_by = ?,
                         resolved_at = ?
                     WHERE id = ?
                     RETURNING {CONFLICT_COLUMNS}"
                ),
                params![status.as_str(), notes, resolved_by.as_str(), now_millis(), id],
                Self::parse_conflict,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("conflict {id}")))
    }
}
