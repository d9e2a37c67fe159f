//! Database layer for Chronicle
//!
//! Repositories borrow a `rusqlite::Connection`. A `Transaction` derefs to a
//! connection, so the same repositories run inside
//! [`Database::write`] units.

mod changelog_repository;
mod conflict_repository;
mod connection;
mod event_repository;
mod migrations;
mod permission_repository;
mod user_repository;
mod version_repository;

use std::str::FromStr;

use rusqlite::types::Type;

pub use changelog_repository::{ChangeLogRepository, SqliteChangeLogRepository};
pub use conflict_repository::{ConflictRepository, SqliteConflictRepository};
pub use connection::Database;
pub use event_repository::{EventRepository, SqliteEventRepository};
pub use permission_repository::{PermissionRepository, SqlitePermissionRepository};
pub use user_repository::{SqliteUserRepository, UserRepository};
pub use version_repository::{SqliteVersionRepository, VersionRepository};

/// Parse a TEXT column into a typed value, reporting the column on failure.
fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

/// Parse a nullable TEXT column.
fn parse_optional_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        raw.parse().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error))
        })
    })
    .transpose()
}

/// Read a Unix-ms INTEGER column as a UTC datetime.
fn datetime_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let millis: i64 = row.get(idx)?;
    chrono::DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}
