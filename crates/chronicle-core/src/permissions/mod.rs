//! Per-event access checks.
//!
//! Every service operation starts with [`PermissionAuthority::authorize`].
//! Callers without any role on an event get the same `NotFound` as callers
//! asking about an event that does not exist.

use rusqlite::Connection;

use crate::db::{
    EventRepository, PermissionRepository, SqliteEventRepository, SqlitePermissionRepository,
};
use crate::error::{Error, Result};
use crate::models::{Actor, Event, EventId, Role};

/// The kind of access an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any role
    Read,
    /// Owner or Editor
    Write,
}

/// The outcome of a successful check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    /// The live event row
    pub event: Event,
    /// The actor's role; `None` for administrators without a grant
    pub role: Option<Role>,
}

pub struct PermissionAuthority;

impl PermissionAuthority {
    pub fn authorize(
        conn: &Connection,
        event_id: &EventId,
        actor: &Actor,
        access: Access,
    ) -> Result<Authorized> {
        let event = SqliteEventRepository::new(conn)
            .get(event_id)?
            .ok_or_else(|| Error::NotFound(format!("event {event_id}")))?;

        let role = SqlitePermissionRepository::new(conn)
            .get(event_id, &actor.user_id)?
            .map(|permission| permission.role);

        if actor.is_admin {
            return Ok(Authorized { event, role });
        }

        let Some(role) = role else {
            tracing::debug!("User {} has no role on event {}", actor.user_id, event_id);
            return Err(Error::NotFound(format!("event {event_id}")));
        };

        if access == Access::Write && !role.can_write() {
            return Err(Error::Forbidden(format!(
                "{role} role cannot modify event {event_id}"
            )));
        }

        Ok(Authorized {
            event,
            role: Some(role),
        })
    }

    /// Whether the actor could write to the event, without failing.
    pub fn can_write(conn: &Connection, event_id: &EventId, actor: &Actor) -> Result<bool> {
        match Self::authorize(conn, event_id, actor, Access::Write) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_) | Error::Forbidden(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteUserRepository, UserRepository};
    use crate::models::{NewEvent, UserId};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        db: Database,
        event: Event,
        owner: UserId,
        editor: UserId,
        viewer: UserId,
        stranger: UserId,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let users = SqliteUserRepository::new(conn);
        let owner = users.create("owner").unwrap().id;
        let editor = users.create("editor").unwrap().id;
        let viewer = users.create("viewer").unwrap().id;
        let stranger = users.create("stranger").unwrap().id;

        let event = Event::new(
            NewEvent::new(
                "Design review",
                Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
            ),
            owner,
        );
        SqliteEventRepository::new(conn).insert(&event).unwrap();
        let permissions = SqlitePermissionRepository::new(conn);
        permissions.upsert(&event.id, &owner, Role::Owner).unwrap();
        permissions.upsert(&event.id, &editor, Role::Editor).unwrap();
        permissions.upsert(&event.id, &viewer, Role::Viewer).unwrap();

        Fixture {
            db,
            event,
            owner,
            editor,
            viewer,
            stranger,
        }
    }

    #[test]
    fn test_roles_and_access() {
        let f = setup();
        let conn = f.db.connection();
        let id = f.event.id;

        for user in [f.owner, f.editor] {
            let ok = PermissionAuthority::authorize(conn, &id, &Actor::user(user), Access::Write)
                .unwrap();
            assert_eq!(ok.event.id, id);
        }

        let read = PermissionAuthority::authorize(conn, &id, &Actor::user(f.viewer), Access::Read)
            .unwrap();
        assert_eq!(read.role, Some(Role::Viewer));

        let error = PermissionAuthority::authorize(conn, &id, &Actor::user(f.viewer), Access::Write)
            .unwrap_err();
        assert!(matches!(error, Error::Forbidden(_)));
    }

    #[test]
    fn test_stranger_sees_not_found() {
        let f = setup();
        let error = PermissionAuthority::authorize(
            f.db.connection(),
            &f.event.id,
            &Actor::user(f.stranger),
            Access::Read,
        )
        .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_admin_bypasses_roles() {
        let f = setup();
        let ok = PermissionAuthority::authorize(
            f.db.connection(),
            &f.event.id,
            &Actor::admin(f.stranger),
            Access::Write,
        )
        .unwrap();
        assert_eq!(ok.role, None);
    }

    #[test]
    fn test_deleted_event_is_not_found_even_for_admin() {
        let f = setup();
        let conn = f.db.connection();
        SqliteEventRepository::new(conn)
            .soft_delete(&f.event.id)
            .unwrap();

        for actor in [Actor::user(f.owner), Actor::admin(f.stranger)] {
            let error =
                PermissionAuthority::authorize(conn, &f.event.id, &actor, Access::Read).unwrap_err();
            assert!(matches!(error, Error::NotFound(_)));
        }
    }

    #[test]
    fn test_can_write() {
        let f = setup();
        let conn = f.db.connection();
        let id = f.event.id;
        assert!(PermissionAuthority::can_write(conn, &id, &Actor::user(f.editor)).unwrap());
        assert!(!PermissionAuthority::can_write(conn, &id, &Actor::user(f.viewer)).unwrap());
        assert!(!PermissionAuthority::can_write(conn, &id, &Actor::user(f.stranger)).unwrap());
    }
}
