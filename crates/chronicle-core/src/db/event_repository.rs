//! Event repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use super::{datetime_column, parse_column};
use crate::error::{Error, Result};
use crate::models::{Event, EventId, UserId};

const EVENT_COLUMNS: &str = "id, title, description, start_time, end_time, location, created_by, \
     created_at, updated_at, is_recurring, recurrence_pattern, version, is_deleted";

/// Trait for event storage operations
pub trait EventRepository {
    /// Insert a freshly built event
    fn insert(&self, event: &Event) -> Result<()>;

    /// Get an active (not deleted) event by ID
    fn get(&self, id: &EventId) -> Result<Option<Event>>;

    /// Get an event by ID, including soft-deleted ones
    fn get_including_deleted(&self, id: &EventId) -> Result<Option<Event>>;

    /// Persist `event`, which must carry `expected_version + 1`.
    ///
    /// Fails with [`Error::VersionTaken`] when the stored row is no longer at
    /// `expected_version`.
    fn update(&self, event: &Event, expected_version: i64) -> Result<()>;

    /// Soft delete an event
    fn soft_delete(&self, id: &EventId) -> Result<bool>;

    /// Active events the user holds any permission on, newest start first
    fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Event>>;

    /// All active events, newest start first
    fn list_all(&self) -> Result<Vec<Event>>;

    /// Active events whose window overlaps `event`'s, excluding `event`
    fn find_overlapping(&self, event: &Event) -> Result<Vec<Event>>;
}

/// `SQLite` implementation of `EventRepository`
pub struct SqliteEventRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEventRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an event from a database row
    fn parse_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
        Ok(Event {
            id: parse_column(row, 0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            start_time: datetime_column(row, 3)?,
            end_time: datetime_column(row, 4)?,
            location: row.get(5)?,
            created_by: parse_column(row, 6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            is_recurring: row.get(9)?,
            recurrence_pattern: row.get(10)?,
            version: row.get(11)?,
            is_deleted: row.get(12)?,
        })
    }

    fn query_events(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(sql)?;
        let events = stmt
            .query_map(params, Self::parse_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn insert(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, title, description, start_time, end_time, location, created_by,
                 created_at, updated_at, is_recurring, recurrence_pattern, version, is_deleted)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                event.id.as_str(),
                event.title,
                event.description,
                event.start_time.timestamp_millis(),
                event.end_time.timestamp_millis(),
                event.location,
                event.created_by.as_str(),
                event.created_at,
                event.updated_at,
                event.is_recurring,
                event.recurrence_pattern,
                event.version,
                event.is_deleted,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &EventId) -> Result<Option<Event>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ? AND is_deleted = 0"),
                params![id.as_str()],
                Self::parse_event,
            )
            .optional()?)
    }

    fn get_including_deleted(&self, id: &EventId) -> Result<Option<Event>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"),
                params![id.as_str()],
                Self::parse_event,
            )
            .optional()?)
    }

    fn update(&self, event: &Event, expected_version: i64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE events SET title = ?, description = ?, start_time = ?, end_time = ?,
                 location = ?, is_recurring = ?, recurrence_pattern = ?, version = ?,
                 updated_at = ?
             WHERE id = ? AND is_deleted = 0 AND version = ?",
            params![
                event.title,
                event.description,
                event.start_time.timestamp_millis(),
                event.end_time.timestamp_millis(),
                event.location,
                event.is_recurring,
                event.recurrence_pattern,
                event.version,
                event.updated_at,
                event.id.as_str(),
                expected_version,
            ],
        )?;

        if updated == 1 {
            return Ok(());
        }
        if self.get(&event.id)?.is_none() {
            return Err(Error::NotFound(format!("event {}", event.id)));
        }
        Err(Error::VersionTaken {
            event_id: event.id.as_str(),
            version_number: event.version,
        })
    }

    fn soft_delete(&self, id: &EventId) -> Result<bool> {
        let now = crate::util::now_millis();
        let updated = self.conn.execute(
            "UPDATE events SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
            params![now, id.as_str()],
        )?;
        Ok(updated > 0)
    }

    fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Event>> {
        let columns = EVENT_COLUMNS
            .split(", ")
            .map(|column| format!("e.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.query_events(
            &format!(
                "SELECT {columns} FROM events e
                 JOIN event_permissions p ON p.event_id = e.id
                 WHERE p.user_id = ? AND e.is_deleted = 0
                 ORDER BY e.start_time DESC, e.id"
            ),
            params![user_id.as_str()],
        )
    }

    fn list_all(&self) -> Result<Vec<Event>> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE is_deleted = 0
                 ORDER BY start_time DESC, id"
            ),
            [],
        )
    }

    fn find_overlapping(&self, event: &Event) -> Result<Vec<Event>> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE start_time < ? AND end_time > ? AND is_deleted = 0 AND id <> ?
                 ORDER BY start_time, id"
            ),
            params![
                event.end_time.timestamp_millis(),
                event.start_time.timestamp_millis(),
                event.id.as_str(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteUserRepository, UserRepository};
    use crate::models::NewEvent;
    use chrono::{DateTime, TimeZone, Utc};

    fn setup() -> (Database, UserId) {
        let db = Database::open_in_memory().unwrap();
        let user = SqliteUserRepository::new(db.connection())
            .create("owner")
            .unwrap();
        (db, user.id)
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn event(owner: UserId, title: &str, start: u32, end: u32) -> Event {
        Event::new(NewEvent::new(title, at(start), at(end)), owner)
    }

    #[test]
    fn test_insert_and_get() {
        let (db, owner) = setup();
        let repo = SqliteEventRepository::new(db.connection());

        let event = event(owner, "Standup", 9, 10);
        repo.insert(&event).unwrap();

        let fetched = repo.get(&event.id).unwrap().unwrap();
        assert_eq!(fetched, event);
    }

    #[test]
    fn test_update_requires_expected_version() {
        let (db, owner) = setup();
        let repo = SqliteEventRepository::new(db.connection());

        let mut event = event(owner, "Standup", 9, 10);
        repo.insert(&event).unwrap();

        event.title = "Renamed".into();
        event.version = 2;
        repo.update(&event, 1).unwrap();
        assert_eq!(repo.get(&event.id).unwrap().unwrap().version, 2);

        // A second writer that also read version 1 loses.
        let error = repo.update(&event, 1).unwrap_err();
        assert!(matches!(error, Error::VersionTaken { version_number: 2, .. }));
    }

    #[test]
    fn test_update_missing_event() {
        let (db, owner) = setup();
        let repo = SqliteEventRepository::new(db.connection());

        let event = event(owner, "Ghost", 9, 10);
        let error = repo.update(&event, 0).unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_soft_delete_hides_event() {
        let (db, owner) = setup();
        let repo = SqliteEventRepository::new(db.connection());

        let event = event(owner, "Standup", 9, 10);
        repo.insert(&event).unwrap();

        assert!(repo.soft_delete(&event.id).unwrap());
        assert!(!repo.soft_delete(&event.id).unwrap());
        assert!(repo.get(&event.id).unwrap().is_none());
        assert!(repo.get_including_deleted(&event.id).unwrap().unwrap().is_deleted);
        assert!(repo.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_find_overlapping_excludes_touching_and_deleted() {
        let (db, owner) = setup();
        let repo = SqliteEventRepository::new(db.connection());

        let subject = event(owner, "Subject", 10, 12);
        let overlapping = event(owner, "Overlap", 11, 13);
        let touching = event(owner, "Touching", 12, 14);
        let deleted = event(owner, "Deleted", 9, 11);
        for e in [&subject, &overlapping, &touching, &deleted] {
            repo.insert(e).unwrap();
        }
        repo.soft_delete(&deleted.id).unwrap();

        let found = repo.find_overlapping(&subject).unwrap();
        let ids: Vec<_> = found.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![overlapping.id]);
    }

    #[test]
    fn test_list_for_user_uses_permissions() {
        let (db, owner) = setup();
        let repo = SqliteEventRepository::new(db.connection());

        let early = event(owner, "Early", 8, 9);
        let late = event(owner, "Late", 15, 16);
        repo.insert(&early).unwrap();
        repo.insert(&late).unwrap();
        db.connection()
            .execute(
                "INSERT INTO event_permissions (event_id, user_id, role, created_at, updated_at)
                 VALUES (?, ?, 'OWNER', 0, 0)",
                params![early.id.as_str(), owner.as_str()],
            )
            .unwrap();

        let visible = repo.list_for_user(&owner).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, early.id);

        let all = repo.list_all().unwrap();
        let titles: Vec<_> = all.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Late", "Early"]);
    }
}
