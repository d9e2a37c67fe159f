//! Event permission repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use super::parse_column;
use crate::error::Result;
use crate::models::{EventId, Permission, Role, UserId};
use crate::util::now_millis;

const PERMISSION_COLUMNS: &str = "id, event_id, user_id, role, created_at, updated_at";

/// Trait for per-event role storage
pub trait PermissionRepository {
    /// Grant `role`, replacing any role the user already holds on the event
    fn upsert(&self, event_id: &EventId, user_id: &UserId, role: Role) -> Result<Permission>;

    /// The user's permission on the event, if any
    fn get(&self, event_id: &EventId, user_id: &UserId) -> Result<Option<Permission>>;

    /// All permissions on the event, oldest grant first
    fn list(&self, event_id: &EventId) -> Result<Vec<Permission>>;

    /// Remove the user's permission; returns whether one existed
    fn delete(&self, event_id: &EventId, user_id: &UserId) -> Result<bool>;
}

/// `SQLite` implementation of `PermissionRepository`
pub struct SqlitePermissionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePermissionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_permission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Permission> {
        Ok(Permission {
            id: row.get(0)?,
            event_id: parse_column(row, 1)?,
            user_id: parse_column(row, 2)?,
            role: parse_column(row, 3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl PermissionRepository for SqlitePermissionRepository<'_> {
    fn upsert(&self, event_id: &EventId, user_id: &UserId, role: Role) -> Result<Permission> {
        let now = now_millis();
        Ok(self.conn.query_row(
            &format!(
                "INSERT INTO event_permissions (event_id, user_id, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (event_id, user_id)
                 DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at
                 RETURNING {PERMISSION_COLUMNS}"
            ),
            params![event_id.as_str(), user_id.as_str(), role.as_str(), now],
            Self::parse_permission,
        )?)
    }

    fn get(&self, event_id: &EventId, user_id: &UserId) -> Result<Option<Permission>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {PERMISSION_COLUMNS} FROM event_permissions
                     WHERE event_id = ? AND user_id = ?"
                ),
                params![event_id.as_str(), user_id.as_str()],
                Self::parse_permission,
            )
            .optional()?)
    }

    fn list(&self, event_id: &EventId) -> Result<Vec<Permission>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM event_permissions
             WHERE event_id = ? ORDER BY created_at, id"
        ))?;
        let permissions = stmt
            .query_map(params![event_id.as_str()], Self::parse_permission)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(permissions)
    }

    fn delete(&self, event_id: &EventId, user_id: &UserId) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM event_permissions WHERE event_id = ? AND user_id = ?",
            params![event_id.as_str(), user_id.as_str()],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        Database, EventRepository, SqliteEventRepository, SqliteUserRepository, UserRepository,
    };
    use crate::models::{Event, NewEvent};
    use chrono::{TimeZone, Utc};

    fn setup() -> (Database, EventId, UserId, UserId) {
        let db = Database::open_in_memory().unwrap();
        let users = SqliteUserRepository::new(db.connection());
        let owner = users.create("owner").unwrap().id;
        let guest = users.create("guest").unwrap().id;
        let event = Event::new(
            NewEvent::new(
                "Review",
                Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap(),
            ),
            owner,
        );
        SqliteEventRepository::new(db.connection())
            .insert(&event)
            .unwrap();
        (db, event.id, owner, guest)
    }

    #[test]
    fn test_upsert_inserts_then_updates_in_place() {
        let (db, event_id, _owner, guest) = setup();
        let repo = SqlitePermissionRepository::new(db.connection());

        let first = repo.upsert(&event_id, &guest, Role::Viewer).unwrap();
        let second = repo.upsert(&event_id, &guest, Role::Editor).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.role, Role::Editor);
        assert_eq!(repo.list(&event_id).unwrap().len(), 1);
    }

    #[test]
    fn test_get_and_delete() {
        let (db, event_id, owner, guest) = setup();
        let repo = SqlitePermissionRepository::new(db.connection());

        repo.upsert(&event_id, &owner, Role::Owner).unwrap();
        assert!(repo.get(&event_id, &guest).unwrap().is_none());
        assert_eq!(
            repo.get(&event_id, &owner).unwrap().unwrap().role,
            Role::Owner
        );

        assert!(repo.delete(&event_id, &owner).unwrap());
        assert!(!repo.delete(&event_id, &owner).unwrap());
        assert!(repo.list(&event_id).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_user_is_rejected_by_foreign_key() {
        let (db, event_id, _owner, _guest) = setup();
        let repo = SqlitePermissionRepository::new(db.connection());
        assert!(repo.upsert(&event_id, &UserId::new(), Role::Viewer).is_err());
    }
}
