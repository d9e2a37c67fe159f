//! Calendar service: one transaction per mutation.
//!
//! Every operation authorizes the actor, then performs all of its writes
//! (event row, permissions, version, change log entry, conflict records)
//! inside a single `BEGIN IMMEDIATE` transaction. A failure at any step rolls
//! the whole unit back.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::conflicts::ConflictDetector;
use crate::db::{
    ChangeLogRepository, ConflictRepository, Database, EventRepository, PermissionRepository,
    SqliteChangeLogRepository, SqliteConflictRepository, SqliteEventRepository,
    SqlitePermissionRepository, SqliteUserRepository, SqliteVersionRepository, UserRepository,
    VersionRepository,
};
use crate::diff::{generate_diff, Diff};
use crate::error::{BatchItemError, Error, Result};
use crate::models::{
    Actor, ChangeLogEntry, ChangeType, Conflict, ConflictStatus, Event, EventId, EventPatch,
    NewChangeLogEntry, NewEvent, Permission, PermissionGrant, Role, User, UserId, Version,
};
use crate::permissions::{Access, PermissionAuthority};
use crate::recurrence::{self, Occurrence};
use crate::util::now_millis;

const INITIAL_VERSION_REASON: &str = "Initial version";

/// Thread-safe entry point for every event operation.
#[derive(Clone)]
pub struct CalendarService {
    db: Arc<Mutex<Database>>,
    config: EngineConfig,
    detector: ConflictDetector,
}

impl CalendarService {
    /// Open a service backed by the database file at `path`.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let db = Database::open_with_config(path, &config)?;
        Ok(Self::from_database(db, config))
    }

    /// Open a service over a fresh in-memory database (primarily for tests).
    pub fn open_in_memory(config: EngineConfig) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db, config))
    }

    fn from_database(db: Database, config: EngineConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            detector: ConflictDetector::new(config.conflict_mode),
            config,
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".to_string()))
    }

    fn write<T>(&self, mut op: impl FnMut(&Connection) -> Result<T>) -> Result<T> {
        let mut db = self.lock()?;
        db.write(self.config.max_write_retries, |tx| op(tx))
    }

    fn read<T>(&self, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let db = self.lock()?;
        op(db.connection())
    }

    // Users

    /// Register a user identity.
    pub fn create_user(&self, username: &str) -> Result<User> {
        let user = self.write(|conn| SqliteUserRepository::new(conn).create(username))?;
        tracing::info!("Created user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub fn get_user(&self, id: &UserId) -> Result<User> {
        self.read(|conn| {
            SqliteUserRepository::new(conn)
                .get(id)?
                .ok_or_else(|| Error::NotFound(format!("user {id}")))
        })
    }

    // Event mutations

    /// Create an event owned by the actor, optionally shared with `grants`.
    pub fn create_event(
        &self,
        actor: &Actor,
        input: NewEvent,
        grants: Vec<PermissionGrant>,
    ) -> Result<Event> {
        let event = self.write(|conn| {
            ensure_user_exists(conn, &actor.user_id)?;
            let event = Event::new(input.clone(), actor.user_id);
            event.validate()?;
            validate_grants(conn, &event, &grants)?;
            self.insert_event(conn, actor, &event, &grants)?;
            Ok(event)
        })?;

        tracing::info!("Created event {} by {}", event.id, actor.user_id);
        Ok(event)
    }

    /// Create every event in `inputs`, or none of them.
    ///
    /// All items are validated before anything is written; the error lists
    /// every rejected item.
    pub fn batch_create(&self, actor: &Actor, inputs: Vec<NewEvent>) -> Result<Vec<Event>> {
        if inputs.is_empty() {
            return Err(Error::Validation("batch contains no events".to_string()));
        }

        let failures: Vec<BatchItemError> = inputs
            .iter()
            .enumerate()
            .filter_map(|(index, input)| {
                Event::new(input.clone(), actor.user_id)
                    .validate()
                    .err()
                    .map(|error| BatchItemError {
                        index,
                        message: error.to_string(),
                    })
            })
            .collect();
        if !failures.is_empty() {
            return Err(Error::Batch(failures));
        }

        let events = self.write(|conn| {
            ensure_user_exists(conn, &actor.user_id)?;
            let mut events = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let event = Event::new(input.clone(), actor.user_id);
                self.insert_event(conn, actor, &event, &[])?;
                events.push(event);
            }
            Ok(events)
        })?;

        tracing::info!("Created {} events in batch by {}", events.len(), actor.user_id);
        Ok(events)
    }

    fn insert_event(
        &self,
        conn: &Connection,
        actor: &Actor,
        event: &Event,
        grants: &[PermissionGrant],
    ) -> Result<()> {
        SqliteEventRepository::new(conn).insert(event)?;

        let permissions = SqlitePermissionRepository::new(conn);
        permissions.upsert(&event.id, &event.created_by, Role::Owner)?;
        for grant in grants {
            permissions.upsert(&event.id, &grant.user_id, grant.role)?;
        }

        let version =
            SqliteVersionRepository::new(conn).record(event, &actor.user_id, INITIAL_VERSION_REASON)?;
        let shared_with: Vec<String> = grants.iter().map(|g| g.user_id.as_str()).collect();
        SqliteChangeLogRepository::new(conn).record(
            NewChangeLogEntry::new(
                event.id,
                version.id,
                ChangeType::Create,
                actor.user_id,
                json!({ "action": "created" }),
            )
            .with_metadata(json!({ "initial_version": true, "shared_with": shared_with })),
        )?;

        self.detector.detect(conn, event)?;
        Ok(())
    }

    /// Apply `patch` and record the result as the next version.
    pub fn update_event(
        &self,
        actor: &Actor,
        id: &EventId,
        patch: EventPatch,
        reason: &str,
    ) -> Result<Event> {
        let event = self.write(|conn| {
            let old = PermissionAuthority::authorize(conn, id, actor, Access::Write)?.event;
            if patch.is_empty() {
                return Err(Error::Validation("update contains no changes".to_string()));
            }

            let mut event = old.clone();
            event.apply_patch(patch.clone());
            event.validate()?;
            event.version = old.version + 1;
            event.updated_at = now_millis();

            SqliteEventRepository::new(conn).update(&event, old.version)?;
            let version =
                SqliteVersionRepository::new(conn).record(&event, &actor.user_id, reason.trim())?;

            let diff = generate_diff(&old.snapshot().to_map()?, &event.snapshot().to_map()?);
            SqliteChangeLogRepository::new(conn).record(NewChangeLogEntry::new(
                event.id,
                version.id,
                ChangeType::Update,
                actor.user_id,
                diff.to_value(),
            ))?;

            self.detector.detect(conn, &event)?;
            Ok(event)
        })?;

        tracing::info!(
            "Updated event {} to version {} by {}",
            event.id,
            event.version,
            actor.user_id
        );
        Ok(event)
    }

    /// Soft delete an event. No version is created.
    pub fn delete_event(&self, actor: &Actor, id: &EventId) -> Result<()> {
        self.write(|conn| {
            PermissionAuthority::authorize(conn, id, actor, Access::Write)?;

            SqliteEventRepository::new(conn).soft_delete(id)?;
            let latest = latest_version(conn, id)?;
            SqliteChangeLogRepository::new(conn).record(NewChangeLogEntry::new(
                *id,
                latest.id,
                ChangeType::Delete,
                actor.user_id,
                json!({ "action": "deleted" }),
            ))?;
            Ok(())
        })?;

        tracing::info!("Deleted event {} by {}", id, actor.user_id);
        Ok(())
    }

    /// Restore the content of version `number` as a new version.
    pub fn rollback(&self, actor: &Actor, id: &EventId, number: i64) -> Result<Event> {
        let event = self.write(|conn| {
            let old = PermissionAuthority::authorize(conn, id, actor, Access::Write)?.event;
            let versions = SqliteVersionRepository::new(conn);
            let target = versions.get(id, number)?;

            let mut event = old.clone();
            event.restore_from(&target.snapshot()?);
            event.validate()?;
            event.version = old.version + 1;
            event.updated_at = now_millis();

            SqliteEventRepository::new(conn).update(&event, old.version)?;
            let version = versions.insert(
                id,
                event.version,
                &target.data,
                &actor.user_id,
                &format!("Rolled back to version {number}"),
            )?;
            SqliteChangeLogRepository::new(conn).record(
                NewChangeLogEntry::new(
                    event.id,
                    version.id,
                    ChangeType::Update,
                    actor.user_id,
                    json!({ "action": "rollback", "to_version": number }),
                )
                .with_metadata(json!({ "from_version": old.version })),
            )?;

            self.detector.detect(conn, &event)?;
            Ok(event)
        })?;

        tracing::info!(
            "Rolled back event {} to version {} (now version {}) by {}",
            event.id,
            number,
            event.version,
            actor.user_id
        );
        Ok(event)
    }

    // Sharing

    /// Grant or change roles on an event.
    pub fn share_event(
        &self,
        actor: &Actor,
        id: &EventId,
        grants: Vec<PermissionGrant>,
    ) -> Result<Vec<Permission>> {
        let permissions = self.write(|conn| {
            let event = PermissionAuthority::authorize(conn, id, actor, Access::Write)?.event;
            if grants.is_empty() {
                return Err(Error::Validation(
                    "at least one permission is required".to_string(),
                ));
            }
            validate_grants(conn, &event, &grants)?;

            let repo = SqlitePermissionRepository::new(conn);
            let permissions = grants
                .iter()
                .map(|grant| repo.upsert(id, &grant.user_id, grant.role))
                .collect::<Result<Vec<_>>>()?;

            let latest = latest_version(conn, id)?;
            let granted: Vec<Value> = grants
                .iter()
                .map(|g| json!({ "user_id": g.user_id, "role": g.role }))
                .collect();
            let shared_with: Vec<String> = grants.iter().map(|g| g.user_id.as_str()).collect();
            SqliteChangeLogRepository::new(conn).record(
                NewChangeLogEntry::new(
                    *id,
                    latest.id,
                    ChangeType::Share,
                    actor.user_id,
                    json!({ "permissions": granted }),
                )
                .with_metadata(json!({ "shared_with": shared_with })),
            )?;
            Ok(permissions)
        })?;

        tracing::info!(
            "Shared event {} with {} users by {}",
            id,
            permissions.len(),
            actor.user_id
        );
        Ok(permissions)
    }

    /// Remove a user's role on an event. The creator cannot be removed.
    pub fn revoke_permission(
        &self,
        actor: &Actor,
        id: &EventId,
        user_id: &UserId,
    ) -> Result<Permission> {
        let removed = self.write(|conn| {
            let event = PermissionAuthority::authorize(conn, id, actor, Access::Write)?.event;
            if event.created_by == *user_id {
                return Err(Error::Validation(
                    "the creator's owner role cannot be revoked".to_string(),
                ));
            }

            let repo = SqlitePermissionRepository::new(conn);
            let permission = repo
                .get(id, user_id)?
                .ok_or_else(|| Error::NotFound(format!("permission for {user_id} on event {id}")))?;
            repo.delete(id, user_id)?;

            let latest = latest_version(conn, id)?;
            SqliteChangeLogRepository::new(conn).record(NewChangeLogEntry::new(
                *id,
                latest.id,
                ChangeType::PermissionChange,
                actor.user_id,
                json!({ "action": "revoked", "user_id": user_id, "role": permission.role }),
            ))?;
            Ok(permission)
        })?;

        tracing::info!("Revoked {} on event {} by {}", user_id, id, actor.user_id);
        Ok(removed)
    }

    pub fn list_permissions(&self, actor: &Actor, id: &EventId) -> Result<Vec<Permission>> {
        self.read(|conn| {
            PermissionAuthority::authorize(conn, id, actor, Access::Read)?;
            SqlitePermissionRepository::new(conn).list(id)
        })
    }

    // Reads

    pub fn get_event(&self, actor: &Actor, id: &EventId) -> Result<Event> {
        self.read(|conn| Ok(PermissionAuthority::authorize(conn, id, actor, Access::Read)?.event))
    }

    /// Events the actor holds any role on; administrators see every event.
    pub fn list_events(&self, actor: &Actor) -> Result<Vec<Event>> {
        self.read(|conn| {
            let events = SqliteEventRepository::new(conn);
            if actor.is_admin {
                events.list_all()
            } else {
                events.list_for_user(&actor.user_id)
            }
        })
    }

    /// Versions of an event, newest first.
    pub fn list_history(&self, actor: &Actor, id: &EventId) -> Result<Vec<Version>> {
        self.read(|conn| {
            PermissionAuthority::authorize(conn, id, actor, Access::Read)?;
            SqliteVersionRepository::new(conn).list(id)
        })
    }

    pub fn get_version(&self, actor: &Actor, id: &EventId, number: i64) -> Result<Version> {
        self.read(|conn| {
            PermissionAuthority::authorize(conn, id, actor, Access::Read)?;
            SqliteVersionRepository::new(conn).get(id, number)
        })
    }

    /// Change log of an event, most recent first.
    pub fn list_changelog(&self, actor: &Actor, id: &EventId) -> Result<Vec<ChangeLogEntry>> {
        self.read(|conn| {
            PermissionAuthority::authorize(conn, id, actor, Access::Read)?;
            SqliteChangeLogRepository::new(conn).list(id)
        })
    }

    /// Diff the stored snapshots of two versions.
    pub fn diff_versions(&self, actor: &Actor, id: &EventId, from: i64, to: i64) -> Result<Diff> {
        self.read(|conn| {
            PermissionAuthority::authorize(conn, id, actor, Access::Read)?;
            let versions = SqliteVersionRepository::new(conn);
            let old = versions.get(id, from)?;
            let new = versions.get(id, to)?;
            Ok(generate_diff(
                &snapshot_map(&old.data)?,
                &snapshot_map(&new.data)?,
            ))
        })
    }

    // Conflicts

    /// Conflicts naming the event on either side.
    pub fn list_conflicts(&self, actor: &Actor, id: &EventId) -> Result<Vec<Conflict>> {
        self.read(|conn| {
            PermissionAuthority::authorize(conn, id, actor, Access::Read)?;
            SqliteConflictRepository::new(conn).list_for_event(id)
        })
    }

    pub fn resolve_conflict(
        &self,
        actor: &Actor,
        conflict_id: i64,
        status: ConflictStatus,
        notes: &str,
    ) -> Result<Conflict> {
        let conflict = self
            .write(|conn| ConflictDetector::resolve(conn, conflict_id, status, notes, actor))?;
        tracing::info!(
            "Conflict {} marked {} by {}",
            conflict.id,
            conflict.resolution_status,
            actor.user_id
        );
        Ok(conflict)
    }

    // Recurrence

    /// Occurrences of a recurring event starting within `[from, to]`.
    pub fn expand_occurrences(
        &self,
        actor: &Actor,
        id: &EventId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>> {
        let event = self.get_event(actor, id)?;
        if from > to {
            return Err(Error::Validation(
                "window start must not be after window end".to_string(),
            ));
        }
        recurrence::expand(&event, from, to)
    }
}

fn ensure_user_exists(conn: &Connection, id: &UserId) -> Result<()> {
    if SqliteUserRepository::new(conn).exists(id)? {
        Ok(())
    } else {
        Err(Error::Validation(format!("unknown user {id}")))
    }
}

/// Grants must name distinct, existing users and leave the creator's owner
/// role alone.
fn validate_grants(conn: &Connection, event: &Event, grants: &[PermissionGrant]) -> Result<()> {
    let users = SqliteUserRepository::new(conn);
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    for grant in grants {
        if !seen.insert(grant.user_id) {
            problems.push(format!("user {} is listed more than once", grant.user_id));
        } else if grant.user_id == event.created_by {
            problems.push("the creator's owner role cannot be changed".to_string());
        } else if !users.exists(&grant.user_id)? {
            problems.push(format!("unknown user {}", grant.user_id));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(problems.join("; ")))
    }
}

fn latest_version(conn: &Connection, id: &EventId) -> Result<Version> {
    SqliteVersionRepository::new(conn)
        .latest(id)?
        .ok_or_else(|| Error::Database(format!("event {id} has no versions")))
}

fn snapshot_map(data: &Value) -> Result<serde_json::Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map.clone()),
        other => Err(Error::Database(format!(
            "stored snapshot is not an object: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConflictMode;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    fn service() -> CalendarService {
        CalendarService::open_in_memory(EngineConfig::default()).unwrap()
    }

    fn user(service: &CalendarService, name: &str) -> Actor {
        Actor::user(service.create_user(name).unwrap().id)
    }

    fn meeting(title: &str) -> NewEvent {
        NewEvent::new(title, at(1, 10, 0), at(1, 11, 0))
    }

    fn version_numbers(service: &CalendarService, actor: &Actor, id: &EventId) -> Vec<i64> {
        service
            .list_history(actor, id)
            .unwrap()
            .iter()
            .map(|v| v.version_number)
            .collect()
    }

    #[test]
    fn test_create_event_records_version_and_changelog() {
        let service = service();
        let owner = user(&service, "owner");

        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();
        assert_eq!(event.version, 1);

        let history = service.list_history(&owner, &event.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_reason, INITIAL_VERSION_REASON);
        assert_eq!(history[0].snapshot().unwrap(), event.snapshot());

        let log = service.list_changelog(&owner, &event.id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].change_type, ChangeType::Create);
        assert_eq!(log[0].changes, json!({ "action": "created" }));
        assert_eq!(log[0].metadata["initial_version"], json!(true));
        assert_eq!(log[0].version_id, history[0].id);

        let permissions = service.list_permissions(&owner, &event.id).unwrap();
        assert_eq!(permissions.len(), 1);
        assert_eq!(permissions[0].role, Role::Owner);
    }

    #[test]
    fn test_create_event_validation_persists_nothing() {
        let service = service();
        let owner = user(&service, "owner");

        let input = NewEvent::new("  ", at(1, 11, 0), at(1, 10, 0));
        let error = service
            .create_event(&owner, input, Vec::new())
            .unwrap_err();
        match error {
            Error::Validation(message) => {
                assert!(message.contains("title is required"));
                assert!(message.contains("end_time must be after start_time"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(service.list_events(&owner).unwrap().is_empty());
    }

    #[test]
    fn test_create_event_with_grants() {
        let service = service();
        let owner = user(&service, "owner");
        let guest = user(&service, "guest");

        let event = service
            .create_event(
                &owner,
                meeting("Kickoff"),
                vec![PermissionGrant::new(guest.user_id, Role::Viewer)],
            )
            .unwrap();

        assert_eq!(service.get_event(&guest, &event.id).unwrap().id, event.id);
        let log = service.list_changelog(&owner, &event.id).unwrap();
        assert_eq!(
            log[0].metadata["shared_with"],
            json!([guest.user_id.as_str()])
        );
    }

    #[test]
    fn test_create_event_rejects_unknown_grant_user() {
        let service = service();
        let owner = user(&service, "owner");

        let error = service
            .create_event(
                &owner,
                meeting("Kickoff"),
                vec![PermissionGrant::new(UserId::new(), Role::Editor)],
            )
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
        assert!(service.list_events(&owner).unwrap().is_empty());
    }

    #[test]
    fn test_update_increments_version_and_logs_diff() {
        let service = service();
        let owner = user(&service, "owner");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        let patch = EventPatch {
            title: Some("Kickoff (moved)".into()),
            location: Some("Room 4".into()),
            ..EventPatch::default()
        };
        let updated = service
            .update_event(&owner, &event.id, patch, "room change")
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.title, "Kickoff (moved)");

        let version = service.get_version(&owner, &event.id, 2).unwrap();
        assert_eq!(version.change_reason, "room change");
        assert_eq!(version.snapshot().unwrap(), updated.snapshot());

        let log = service.list_changelog(&owner, &event.id).unwrap();
        assert_eq!(log[0].change_type, ChangeType::Update);
        assert_eq!(log[0].version_id, version.id);
        let diff: Diff = serde_json::from_value(log[0].changes.clone()).unwrap();
        let keys = diff.changed_keys();
        for key in ["location", "title", "version"] {
            assert!(keys.contains(&key), "missing {key} in {keys:?}");
        }
        assert!(!keys.contains(&"description"));
        assert_eq!(diff.modified["title"].new, json!("Kickoff (moved)"));
        assert_eq!(diff.modified["version"].old, json!(1));
    }

    #[test]
    fn test_version_matches_history_count() {
        let service = service();
        let owner = user(&service, "owner");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        for n in 0..4 {
            let patch = EventPatch {
                description: Some(format!("revision {n}")),
                ..EventPatch::default()
            };
            service.update_event(&owner, &event.id, patch, "").unwrap();
        }

        let current = service.get_event(&owner, &event.id).unwrap();
        assert_eq!(current.version, 5);
        assert_eq!(version_numbers(&service, &owner, &event.id), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_empty_update_is_rejected() {
        let service = service();
        let owner = user(&service, "owner");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        let error = service
            .update_event(&owner, &event.id, EventPatch::default(), "")
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
    }

    #[test]
    fn test_invalid_update_leaves_event_untouched() {
        let service = service();
        let owner = user(&service, "owner");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        let patch = EventPatch {
            end_time: Some(at(1, 9, 0)),
            ..EventPatch::default()
        };
        let error = service
            .update_event(&owner, &event.id, patch, "")
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
        assert_eq!(service.get_event(&owner, &event.id).unwrap(), event);
        assert_eq!(version_numbers(&service, &owner, &event.id), vec![1]);
    }

    #[test]
    fn test_viewer_update_is_forbidden_without_side_effects() {
        let service = service();
        let owner = user(&service, "owner");
        let viewer = user(&service, "viewer");
        let event = service
            .create_event(
                &owner,
                meeting("Kickoff"),
                vec![PermissionGrant::new(viewer.user_id, Role::Viewer)],
            )
            .unwrap();

        let patch = EventPatch {
            title: Some("Hijacked".into()),
            ..EventPatch::default()
        };
        let error = service
            .update_event(&viewer, &event.id, patch, "")
            .unwrap_err();
        assert!(matches!(error, Error::Forbidden(_)));

        assert_eq!(service.get_event(&owner, &event.id).unwrap(), event);
        assert_eq!(version_numbers(&service, &owner, &event.id), vec![1]);
        assert_eq!(service.list_changelog(&owner, &event.id).unwrap().len(), 1);
    }

    #[test]
    fn test_sub_millisecond_times_match_stored_row() {
        let service = service();
        let owner = user(&service, "owner");
        let precise = at(1, 10, 0) + chrono::Duration::microseconds(500);
        let input = NewEvent::new("Kickoff", precise, at(1, 11, 0));

        let event = service.create_event(&owner, input, Vec::new()).unwrap();
        assert_eq!(event.start_time, at(1, 10, 0));
        assert_eq!(service.get_event(&owner, &event.id).unwrap(), event);

        let patch = EventPatch {
            title: Some("Renamed".into()),
            ..EventPatch::default()
        };
        service.update_event(&owner, &event.id, patch, "").unwrap();
        let diff = service.diff_versions(&owner, &event.id, 1, 2).unwrap();
        assert!(diff.modified.contains_key("title"));
        assert!(!diff.modified.contains_key("start_time"));
        assert!(!diff.modified.contains_key("end_time"));

        let rolled_back = service.rollback(&owner, &event.id, 1).unwrap();
        let stored = service.get_event(&owner, &event.id).unwrap();
        assert_eq!(stored, rolled_back);
        let v1 = service.get_version(&owner, &event.id, 1).unwrap();
        assert_eq!(v1.snapshot().unwrap().start_time, stored.start_time);
        assert_eq!(v1.snapshot().unwrap().end_time, stored.end_time);
    }

    #[test]
    fn test_window_inside_one_millisecond_is_validation_error() {
        let service = service();
        let owner = user(&service, "owner");
        let start = at(1, 10, 0) + chrono::Duration::microseconds(100);
        let input = NewEvent::new("Blink", start, start + chrono::Duration::microseconds(500));

        let error = service
            .create_event(&owner, input, Vec::new())
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
        assert!(service.list_events(&owner).unwrap().is_empty());
    }

    #[test]
    fn test_access_is_checked_before_input_shape() {
        let service = service();
        let owner = user(&service, "owner");
        let viewer = user(&service, "viewer");
        let stranger = user(&service, "stranger");
        let event = service
            .create_event(
                &owner,
                meeting("Kickoff"),
                vec![PermissionGrant::new(viewer.user_id, Role::Viewer)],
            )
            .unwrap();

        assert!(matches!(
            service.update_event(&viewer, &event.id, EventPatch::default(), ""),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            service.share_event(&viewer, &event.id, Vec::new()),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            service.expand_occurrences(&stranger, &event.id, at(2, 0, 0), at(1, 0, 0)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_non_member_sees_not_found() {
        let service = service();
        let owner = user(&service, "owner");
        let stranger = user(&service, "stranger");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        assert!(matches!(
            service.get_event(&stranger, &event.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.delete_event(&stranger, &event.id),
            Err(Error::NotFound(_))
        ));
        assert!(service.list_events(&stranger).unwrap().is_empty());
    }

    #[test]
    fn test_admin_can_update_any_event() {
        let service = service();
        let owner = user(&service, "owner");
        let admin = Actor::admin(service.create_user("root").unwrap().id);
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        let patch = EventPatch {
            title: Some("Audited".into()),
            ..EventPatch::default()
        };
        let updated = service
            .update_event(&admin, &event.id, patch, "admin fix")
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(service.list_events(&admin).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_creates_no_version() {
        let service = service();
        let owner = user(&service, "owner");
        let admin = Actor::admin(owner.user_id);
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        service.delete_event(&owner, &event.id).unwrap();

        assert!(matches!(
            service.get_event(&owner, &event.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.list_history(&admin, &event.id),
            Err(Error::NotFound(_))
        ));

        let db = service.lock().unwrap();
        let conn = db.connection();
        assert_eq!(SqliteVersionRepository::new(conn).count(&event.id).unwrap(), 1);
        let log = SqliteChangeLogRepository::new(conn).list(&event.id).unwrap();
        assert_eq!(log[0].change_type, ChangeType::Delete);
        assert_eq!(log[0].changes, json!({ "action": "deleted" }));
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let service = service();
        let owner = user(&service, "owner");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();
        let patch = EventPatch {
            title: Some("Renamed".into()),
            start_time: Some(at(2, 10, 0)),
            end_time: Some(at(2, 12, 0)),
            ..EventPatch::default()
        };
        service.update_event(&owner, &event.id, patch, "").unwrap();

        let restored = service.rollback(&owner, &event.id, 1).unwrap();
        assert_eq!(restored.version, 3);
        assert_eq!(restored.title, "Kickoff");
        assert_eq!(restored.start_time, event.start_time);
        assert_eq!(restored.created_at, event.created_at);

        let v1 = service.get_version(&owner, &event.id, 1).unwrap();
        let v3 = service.get_version(&owner, &event.id, 3).unwrap();
        assert_eq!(v3.data, v1.data);
        assert_eq!(v3.change_reason, "Rolled back to version 1");

        let log = service.list_changelog(&owner, &event.id).unwrap();
        assert_eq!(log[0].change_type, ChangeType::Update);
        assert_eq!(log[0].changes, json!({ "action": "rollback", "to_version": 1 }));
        assert_eq!(log[0].metadata, json!({ "from_version": 2 }));
    }

    #[test]
    fn test_rollback_to_missing_version() {
        let service = service();
        let owner = user(&service, "owner");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        let error = service.rollback(&owner, &event.id, 9).unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
        assert_eq!(service.get_event(&owner, &event.id).unwrap().version, 1);
    }

    #[test]
    fn test_rollback_runs_conflict_detection() {
        let service = service();
        let owner = user(&service, "owner");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();
        let patch = EventPatch {
            start_time: Some(at(3, 10, 0)),
            end_time: Some(at(3, 11, 0)),
            ..EventPatch::default()
        };
        service.update_event(&owner, &event.id, patch, "").unwrap();
        let other = service
            .create_event(&owner, meeting("Standup"), Vec::new())
            .unwrap();
        assert!(service.list_conflicts(&owner, &other.id).unwrap().is_empty());

        service.rollback(&owner, &event.id, 1).unwrap();
        let conflicts = service.list_conflicts(&owner, &other.id).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].involves(&event.id));
    }

    #[test]
    fn test_overlap_example_records_single_conflict() {
        let service = service();
        let owner = user(&service, "owner");
        let a = service
            .create_event(
                &owner,
                NewEvent::new("A", at(1, 10, 0), at(1, 11, 0)),
                Vec::new(),
            )
            .unwrap();
        let b = service
            .create_event(
                &owner,
                NewEvent::new("B", at(1, 10, 30), at(1, 11, 30)),
                Vec::new(),
            )
            .unwrap();

        let conflicts = service.list_conflicts(&owner, &a.id).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].event_id, b.id);
        assert_eq!(conflicts[0].conflicting_event_id, a.id);
        assert_eq!(conflicts[0].resolution_status, ConflictStatus::Pending);

        // Saving A again does not add the mirror pair.
        let patch = EventPatch {
            description: Some("agenda".into()),
            ..EventPatch::default()
        };
        service.update_event(&owner, &a.id, patch, "").unwrap();
        assert_eq!(service.list_conflicts(&owner, &a.id).unwrap().len(), 1);
    }

    #[test]
    fn test_directional_mode_records_mirror_on_resave() {
        let config = EngineConfig {
            conflict_mode: ConflictMode::Directional,
            ..EngineConfig::default()
        };
        let service = CalendarService::open_in_memory(config).unwrap();
        let owner = user(&service, "owner");
        let a = service
            .create_event(&owner, meeting("A"), Vec::new())
            .unwrap();
        service
            .create_event(&owner, meeting("B"), Vec::new())
            .unwrap();

        let patch = EventPatch {
            description: Some("agenda".into()),
            ..EventPatch::default()
        };
        service.update_event(&owner, &a.id, patch, "").unwrap();
        assert_eq!(service.list_conflicts(&owner, &a.id).unwrap().len(), 2);
    }

    #[test]
    fn test_resolve_conflict() {
        let service = service();
        let owner = user(&service, "owner");
        let a = service
            .create_event(&owner, meeting("A"), Vec::new())
            .unwrap();
        service
            .create_event(&owner, meeting("B"), Vec::new())
            .unwrap();
        let conflict = service.list_conflicts(&owner, &a.id).unwrap().remove(0);

        let resolved = service
            .resolve_conflict(&owner, conflict.id, ConflictStatus::Resolved, "moved B")
            .unwrap();
        assert_eq!(resolved.resolution_status, ConflictStatus::Resolved);
        assert_eq!(resolved.resolved_by, Some(owner.user_id));
    }

    #[test]
    fn test_batch_create_reports_every_invalid_item() {
        let service = service();
        let owner = user(&service, "owner");

        let inputs = vec![
            meeting("Valid"),
            NewEvent::new("", at(1, 10, 0), at(1, 11, 0)),
            NewEvent::new("Backwards", at(1, 11, 0), at(1, 10, 0)),
        ];
        let error = service.batch_create(&owner, inputs).unwrap_err();
        let items = match error {
            Error::Batch(items) => items,
            other => panic!("expected batch error, got {other:?}"),
        };
        let indices: Vec<_> = items.iter().map(|item| item.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(service.list_events(&owner).unwrap().is_empty());
    }

    #[test]
    fn test_batch_create_all_or_nothing_success() {
        let service = service();
        let owner = user(&service, "owner");

        let events = service
            .batch_create(
                &owner,
                vec![
                    NewEvent::new("One", at(1, 8, 0), at(1, 9, 0)),
                    NewEvent::new("Two", at(1, 9, 0), at(1, 10, 0)),
                ],
            )
            .unwrap();
        assert_eq!(events.len(), 2);
        for event in &events {
            assert_eq!(version_numbers(&service, &owner, &event.id), vec![1]);
        }
        assert!(matches!(
            service.batch_create(&owner, Vec::new()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_share_and_revoke() {
        let service = service();
        let owner = user(&service, "owner");
        let guest = user(&service, "guest");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        let granted = service
            .share_event(
                &owner,
                &event.id,
                vec![PermissionGrant::new(guest.user_id, Role::Editor)],
            )
            .unwrap();
        assert_eq!(granted[0].role, Role::Editor);

        let log = service.list_changelog(&owner, &event.id).unwrap();
        assert_eq!(log[0].change_type, ChangeType::Share);
        assert_eq!(
            log[0].changes,
            json!({ "permissions": [{ "user_id": guest.user_id.as_str(), "role": "EDITOR" }] })
        );

        let patch = EventPatch {
            location: Some("Room 2".into()),
            ..EventPatch::default()
        };
        service.update_event(&guest, &event.id, patch, "").unwrap();

        let removed = service
            .revoke_permission(&owner, &event.id, &guest.user_id)
            .unwrap();
        assert_eq!(removed.role, Role::Editor);
        assert!(matches!(
            service.get_event(&guest, &event.id),
            Err(Error::NotFound(_))
        ));
        let log = service.list_changelog(&owner, &event.id).unwrap();
        assert_eq!(log[0].change_type, ChangeType::PermissionChange);
    }

    #[test]
    fn test_creator_owner_role_is_protected() {
        let service = service();
        let owner = user(&service, "owner");
        let editor = user(&service, "editor");
        let event = service
            .create_event(
                &owner,
                meeting("Kickoff"),
                vec![PermissionGrant::new(editor.user_id, Role::Editor)],
            )
            .unwrap();

        let demote = service
            .share_event(
                &editor,
                &event.id,
                vec![PermissionGrant::new(owner.user_id, Role::Viewer)],
            )
            .unwrap_err();
        assert!(matches!(demote, Error::Validation(_)));

        let revoke = service
            .revoke_permission(&editor, &event.id, &owner.user_id)
            .unwrap_err();
        assert!(matches!(revoke, Error::Validation(_)));

        let missing = service
            .revoke_permission(&owner, &event.id, &UserId::new())
            .unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[test]
    fn test_share_rejects_empty_and_duplicate_grants() {
        let service = service();
        let owner = user(&service, "owner");
        let guest = user(&service, "guest");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();

        assert!(matches!(
            service.share_event(&owner, &event.id, Vec::new()),
            Err(Error::Validation(_))
        ));
        let duplicate = vec![
            PermissionGrant::new(guest.user_id, Role::Viewer),
            PermissionGrant::new(guest.user_id, Role::Editor),
        ];
        assert!(matches!(
            service.share_event(&owner, &event.id, duplicate),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_diff_versions() {
        let service = service();
        let owner = user(&service, "owner");
        let event = service
            .create_event(&owner, meeting("Kickoff"), Vec::new())
            .unwrap();
        let patch = EventPatch {
            title: Some("Renamed".into()),
            ..EventPatch::default()
        };
        service.update_event(&owner, &event.id, patch, "").unwrap();

        let diff = service.diff_versions(&owner, &event.id, 1, 2).unwrap();
        assert_eq!(diff.modified["title"].old, json!("Kickoff"));
        assert_eq!(diff.modified["title"].new, json!("Renamed"));
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());

        assert!(service
            .diff_versions(&owner, &event.id, 2, 2)
            .unwrap()
            .is_empty());
        assert!(matches!(
            service.diff_versions(&owner, &event.id, 1, 5),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_expand_occurrences() {
        let service = service();
        let owner = user(&service, "owner");
        let input = NewEvent::new("Sync", at(1, 9, 0), at(31, 9, 30))
            .with_recurrence("FREQ=WEEKLY;INTERVAL=2");
        let event = service.create_event(&owner, input, Vec::new()).unwrap();

        let occurrences = service
            .expand_occurrences(&owner, &event.id, at(1, 0, 0), at(31, 23, 0))
            .unwrap();
        let starts: Vec<_> = occurrences.iter().map(|o| o.start_time).collect();
        assert_eq!(starts, vec![at(1, 9, 0), at(15, 9, 0), at(29, 9, 0)]);

        assert!(matches!(
            service.expand_occurrences(&owner, &event.id, at(2, 0, 0), at(1, 0, 0)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_recurring_event_requires_valid_pattern() {
        let service = service();
        let owner = user(&service, "owner");
        let input = meeting("Sync").with_recurrence("FREQ=HOURLY");
        let error = service
            .create_event(&owner, input, Vec::new())
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
    }

    #[test]
    fn test_get_user() {
        let service = service();
        let created = service.create_user("dana").unwrap();
        assert_eq!(service.get_user(&created.id).unwrap(), created);
        assert!(matches!(
            service.get_user(&UserId::new()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.create_user("Dana"),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_concurrent_updates_keep_versions_gapless() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chronicle.db");
        let config = EngineConfig {
            max_write_retries: 10,
            ..EngineConfig::default()
        };
        let first = CalendarService::open(&path, config.clone()).unwrap();
        let second = CalendarService::open(&path, config).unwrap();

        let owner = user(&first, "owner");
        let event = first
            .create_event(&owner, meeting("Contended"), Vec::new())
            .unwrap();

        let workers: Vec<_> = [first.clone(), second.clone(), first.clone(), second]
            .into_iter()
            .enumerate()
            .map(|(worker, service)| {
                std::thread::spawn(move || {
                    for n in 0..5 {
                        let patch = EventPatch {
                            description: Some(format!("worker {worker} edit {n}")),
                            ..EventPatch::default()
                        };
                        service
                            .update_event(&owner, &event.id, patch, "concurrent")
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let current = first.get_event(&owner, &event.id).unwrap();
        assert_eq!(current.version, 21);
        let numbers = version_numbers(&first, &owner, &event.id);
        assert_eq!(numbers, (1..=21).rev().collect::<Vec<_>>());
    }
}
