pub mod common;
pub mod completions;
pub mod conflicts;
pub mod create;
pub mod delete;
pub mod history;
pub mod occurrences;
pub mod share;
pub mod show;
pub mod update;
pub mod users;
