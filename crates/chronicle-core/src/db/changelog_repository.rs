//! Change log repository implementation

use rusqlite::{params, Connection};

use super::parse_column;
use crate::error::Result;
use crate::models::{ChangeLogEntry, EventId, NewChangeLogEntry};
use crate::util::now_millis;

const ENTRY_COLUMNS: &str =
    "id, event_id, version_id, change_type, changed_by, changed_at, changes, metadata";

/// Trait for append-only audit entries
pub trait ChangeLogRepository {
    /// Append an entry stamped with the current time
    fn record(&self, entry: NewChangeLogEntry) -> Result<ChangeLogEntry>;

    /// Entries for an event, most recent first
    fn list(&self, event_id: &EventId) -> Result<Vec<ChangeLogEntry>>;
}

/// `SQLite` implementation of `ChangeLogRepository`
pub struct SqliteChangeLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteChangeLogRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChangeLogEntry> {
        Ok(ChangeLogEntry {
            id: row.get(0)?,
            event_id: parse_column(row, 1)?,
            version_id: row.get(2)?,
            change_type: parse_column(row, 3)?,
            changed_by: parse_column(row, 4)?,
            changed_at: row.get(5)?,
            changes: row.get(6)?,
            metadata: row.get(7)?,
        })
    }
}

impl ChangeLogRepository for SqliteChangeLogRepository<'_> {
    fn record(&self, entry: NewChangeLogEntry) -> Result<ChangeLogEntry> {
        Ok(self.conn.query_row(
            &format!(
                "INSERT INTO event_changelog
                     (event_id, version_id, change_type, changed_by, changed_at, changes, metadata)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 RETURNING {ENTRY_COLUMNS}"
            ),
            params![
                entry.event_id.as_str(),
                entry.version_id,
                entry.change_type.as_str(),
                entry.changed_by.as_str(),
                now_millis(),
                entry.changes,
                entry.metadata,
            ],
            Self::parse_entry,
        )?)
    }

    fn list(&self, event_id: &EventId) -> Result<Vec<ChangeLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM event_changelog
             WHERE event_id = ? ORDER BY changed_at DESC, id DESC"
        ))?;
        let entries = stmt
            .query_map(params![event_id.as_str()], Self::parse_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
