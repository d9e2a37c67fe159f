//! chronicle-core - Core library for Chronicle
//!
//! This crate contains the event models, the SQLite-backed version store and
//! change log, the permission gate, conflict detection, and the
//! `CalendarService` that ties them together under one transaction per
//! mutation. Outer layers (the CLI, an HTTP API) only call into
//! [`services::CalendarService`].

pub mod config;
pub mod conflicts;
pub mod db;
pub mod diff;
pub mod error;
pub mod models;
pub mod permissions;
pub mod recurrence;
pub mod services;
pub mod util;

pub use config::{ConflictMode, EngineConfig};
pub use diff::{generate_diff, Diff, FieldChange};
pub use error::{BatchItemError, Error, Result};
pub use models::{
    Actor, ChangeLogEntry, ChangeType, Conflict, ConflictStatus, Event, EventId, EventPatch,
    NewEvent, Permission, PermissionGrant, Role, User, UserId, Version,
};
pub use services::CalendarService;
