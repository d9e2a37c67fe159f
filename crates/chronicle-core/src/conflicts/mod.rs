//! Overlap detection between active events.
//!
//! Detection runs after every write that can move an event's window. Each
//! newly overlapping pair gets one `Pending` record; running detection again
//! inserts nothing new.

use rusqlite::Connection;

use crate::config::ConflictMode;
use crate::db::{
    ConflictRepository, EventRepository, SqliteConflictRepository, SqliteEventRepository,
};
use crate::error::{Error, Result};
use crate::models::{Actor, Conflict, ConflictStatus, Event};
use crate::permissions::PermissionAuthority;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    mode: ConflictMode,
}

impl ConflictDetector {
    pub const fn new(mode: ConflictMode) -> Self {
        Self { mode }
    }

    pub const fn mode(&self) -> ConflictMode {
        self.mode
    }

    /// Record a conflict for every active event overlapping `event`.
    ///
    /// Returns only the records inserted by this call.
    pub fn detect(&self, conn: &Connection, event: &Event) -> Result<Vec<Conflict>> {
        let candidates = SqliteEventRepository::new(conn).find_overlapping(event)?;
        let conflicts = SqliteConflictRepository::new(conn);

        let mut recorded = Vec::new();
        for candidate in &candidates {
            let known = match self.mode {
                ConflictMode::Directional => conflicts.exists(&event.id, &candidate.id)?,
                ConflictMode::Symmetric => {
                    conflicts.exists(&event.id, &candidate.id)?
                        || conflicts.exists(&candidate.id, &event.id)?
                }
            };
            if known {
                continue;
            }
            recorded.push(conflicts.insert(&event.id, &candidate.id)?);
        }

        tracing::debug!(
            "Conflict scan for event {}: {} overlapping, {} new",
            event.id,
            candidates.len(),
            recorded.len()
        );
        Ok(recorded)
    }

    /// Move a pending conflict to `Resolved` or `Ignored`.
    ///
    /// The actor needs write access to either event. Conflicts naming events
    /// the actor cannot see are reported as `NotFound`.
    pub fn resolve(
        conn: &Connection,
        conflict_id: i64,
        status: ConflictStatus,
        notes: &str,
        actor: &Actor,
    ) -> Result<Conflict> {
        let repo = SqliteConflictRepository::new(conn);
        let conflict = repo
            .get(conflict_id)?
            .ok_or_else(|| Error::NotFound(format!("conflict {conflict_id}")))?;

        if !actor.is_admin
            && !PermissionAuthority::can_write(conn, &conflict.event_id, actor)?
            && !PermissionAuthority::can_write(conn, &conflict.conflicting_event_id, actor)?
        {
            return Err(Error::NotFound(format!("conflict {conflict_id}")));
        }

        if status == ConflictStatus::Pending {
            return Err(Error::Validation(
                "a conflict can only be resolved or ignored".to_string(),
            ));
        }
        if conflict.resolution_status != ConflictStatus::Pending {
            return Err(Error::Conflict(format!(
                "conflict {conflict_id} is already {}",
                conflict.resolution_status
            )));
        }

        repo.resolve(conflict_id, status, notes.trim(), &actor.user_id)
    }
}
