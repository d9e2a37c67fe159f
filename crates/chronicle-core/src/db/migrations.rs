//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: events, permissions, versions, change log, conflicts
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            location TEXT NOT NULL DEFAULT '',
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            is_recurring INTEGER NOT NULL DEFAULT 0,
            recurrence_pattern TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            CHECK (start_time < end_time)
        );
        CREATE INDEX IF NOT EXISTS idx_events_window ON events(start_time, end_time);
        CREATE INDEX IF NOT EXISTS idx_events_created_by ON events(created_by);
        CREATE TABLE IF NOT EXISTS event_permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('OWNER', 'EDITOR', 'VIEWER')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (event_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_event_permissions_user ON event_permissions(user_id);
        CREATE TABLE IF NOT EXISTS event_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            version_number INTEGER NOT NULL CHECK (version_number >= 1),
            data TEXT NOT NULL,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at INTEGER NOT NULL,
            change_reason TEXT NOT NULL DEFAULT '',
            UNIQUE (event_id, version_number)
        );
        CREATE TABLE IF NOT EXISTS event_changelog (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            version_id INTEGER NOT NULL REFERENCES event_versions(id) ON DELETE CASCADE,
            change_type TEXT NOT NULL CHECK (
                change_type IN ('CREATE', 'UPDATE', 'DELETE', 'SHARE', 'PERMISSION_CHANGE')
            ),
            changed_by TEXT NOT NULL REFERENCES users(id),
            changed_at INTEGER NOT NULL,
            changes TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_event_changelog_event
            ON event_changelog(event_id, changed_at DESC);
        CREATE INDEX IF NOT EXISTS idx_event_changelog_type ON event_changelog(change_type);
        CREATE TABLE IF NOT EXISTS event_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            conflicting_event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            detected_at INTEGER NOT NULL,
            resolution_status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (resolution_status IN ('PENDING', 'RESOLVED', 'IGNORED')),
            resolution_notes TEXT NOT NULL DEFAULT '',
            resolved_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            resolved_at INTEGER,
            UNIQUE (event_id, conflicting_event_id),
            CHECK (event_id <> conflicting_event_id)
        );
        CREATE INDEX IF NOT EXISTS idx_event_conflicts_other
            ON event_conflicts(conflicting_event_id);
        CREATE INDEX IF NOT EXISTS idx_event_conflicts_status
            ON event_conflicts(resolution_status);
        INSERT INTO schema_version (version) VALUES (1);
        COMMIT;",
    )
    .inspect_err(|_| {
        conn.execute_batch("ROLLBACK").ok();
    })?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: append-only guards on history tables
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TRIGGER IF NOT EXISTS event_versions_immutable
        BEFORE UPDATE ON event_versions
        BEGIN
            SELECT RAISE(ABORT, 'event versions are immutable');
        END;
        CREATE TRIGGER IF NOT EXISTS event_changelog_immutable
        BEFORE UPDATE ON event_changelog
        BEGIN
            SELECT RAISE(ABORT, 'change log entries are immutable');
        END;
        INSERT INTO schema_version (version) VALUES (2);
        COMMIT;",
    )
    .inspect_err(|_| {
        conn.execute_batch("ROLLBACK").ok();
    })?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
