//! Data models for Chronicle

mod changelog;
mod conflict;
mod event;
mod permission;
mod user;
mod version;

pub use changelog::{ChangeLogEntry, ChangeType, NewChangeLogEntry};
pub use conflict::{Conflict, ConflictStatus};
pub use event::{Event, EventId, EventPatch, EventSnapshot, NewEvent};
pub use permission::{Permission, PermissionGrant, Role};
pub use user::{Actor, User, UserId};
pub use version::Version;
