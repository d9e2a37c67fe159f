use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use chronicle_core::recurrence::Occurrence;
use chronicle_core::{
    Actor, CalendarService, ChangeLogEntry, Conflict, Diff, EngineConfig, Event, EventId,
    Permission, PermissionGrant, Role, UserId, Version,
};
use serde::Serialize;

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("CHRONICLE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chronicle")
        .join("chronicle.db")
}

pub fn open_service(path: &Path) -> Result<CalendarService, CliError> {
    let config = EngineConfig::from_env()?;
    Ok(CalendarService::open(path, config)?)
}

/// Build the acting identity from `--as`, then `CHRONICLE_USER`.
pub fn resolve_actor(as_user: Option<String>, admin: bool) -> Result<Actor, CliError> {
    let raw = as_user
        .or_else(|| env::var("CHRONICLE_USER").ok())
        .ok_or(CliError::MissingActor)?;
    let user_id = parse_user_id(&raw)?;
    Ok(if admin {
        Actor::admin(user_id)
    } else {
        Actor::user(user_id)
    })
}

pub fn parse_event_id(raw: &str) -> Result<EventId, CliError> {
    raw.trim().parse().map_err(|_| CliError::InvalidId {
        kind: "event",
        value: raw.to_string(),
    })
}

pub fn parse_user_id(raw: &str) -> Result<UserId, CliError> {
    raw.trim().parse().map_err(|_| CliError::InvalidId {
        kind: "user",
        value: raw.to_string(),
    })
}

/// Accept RFC 3339, or a bare `YYYY-MM-DD HH:MM[:SS]` / `YYYY-MM-DDTHH:MM`
/// read as UTC.
pub fn parse_time(raw: &str) -> Result<DateTime<Utc>, CliError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CliError::InvalidTime(raw.to_string()))
}

/// Parse `USER_ID` or `USER_ID:ROLE`; the role defaults to viewer.
pub fn parse_grant(raw: &str) -> Result<PermissionGrant, CliError> {
    let (user, role) = match raw.trim().split_once(':') {
        Some((user, role)) => {
            let role: Role = role
                .parse()
                .map_err(|_| CliError::InvalidGrant(raw.to_string()))?;
            (user, role)
        }
        None => (raw.trim(), Role::default()),
    };
    let user_id = user
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidGrant(raw.to_string()))?;
    Ok(PermissionGrant::new(user_id, role))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn title_preview(title: &str, max_chars: usize) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_event_lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            let id = short_id(&event.id.to_string());
            let title = title_preview(&event.title, 40);
            let recurring = if event.is_recurring { "  (recurring)" } else { "" };
            format!(
                "{id:<13}  {}  {}  v{:<3}  {title}{recurring}",
                format_time(&event.start_time),
                format_time(&event.end_time),
                event.version
            )
        })
        .collect()
}

pub fn format_event_details(event: &Event) -> Vec<String> {
    let mut lines = vec![
        format!("id:          {}", event.id),
        format!("title:       {}", event.title),
        format!(
            "when:        {} to {}",
            format_time(&event.start_time),
            format_time(&event.end_time)
        ),
        format!("version:     {}", event.version),
        format!("created by:  {}", event.created_by),
        format!("updated:     {}", format_timestamp(event.updated_at)),
    ];
    if !event.location.is_empty() {
        lines.push(format!("location:    {}", event.location));
    }
    if let Some(pattern) = &event.recurrence_pattern {
        lines.push(format!("recurrence:  {pattern}"));
    }
    if !event.description.is_empty() {
        lines.push(String::new());
        lines.push(event.description.clone());
    }
    lines
}

pub fn format_version_lines(versions: &[Version]) -> Vec<String> {
    versions
        .iter()
        .map(|version| {
            let reason = if version.change_reason.is_empty() {
                "-"
            } else {
                version.change_reason.as_str()
            };
            format!(
                "v{:<4}  {}  by={}  {reason}",
                version.version_number,
                format_timestamp(version.created_at),
                short_id(&version.created_by.to_string())
            )
        })
        .collect()
}

pub fn format_changelog_lines(entries: &[ChangeLogEntry], now_ms: i64) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{:<17}  {:<10}  by={}  {}",
                entry.change_type.as_str(),
                format_relative_time(entry.changed_at, now_ms),
                short_id(&entry.changed_by.to_string()),
                entry.changes
            )
        })
        .collect()
}

pub fn format_permission_lines(permissions: &[Permission]) -> Vec<String> {
    permissions
        .iter()
        .map(|permission| format!("{:<6}  {}", permission.role.as_str(), permission.user_id))
        .collect()
}

pub fn format_conflict_lines(conflicts: &[Conflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            let mut line = format!(
                "#{:<5} {:<8}  event={}  conflicts_with={}  detected={}",
                conflict.id,
                conflict.resolution_status.as_str(),
                short_id(&conflict.event_id.to_string()),
                short_id(&conflict.conflicting_event_id.to_string()),
                format_timestamp(conflict.detected_at)
            );
            if !conflict.resolution_notes.is_empty() {
                line.push_str(&format!("  notes={}", conflict.resolution_notes));
            }
            line
        })
        .collect()
}

pub fn format_diff_lines(diff: &Diff) -> Vec<String> {
    if diff.is_empty() {
        return vec!["(no differences)".to_string()];
    }

    let mut lines = Vec::new();
    for (key, value) in &diff.added {
        lines.push(format!("+ {key}: {value}"));
    }
    for (key, change) in &diff.modified {
        lines.push(format!("~ {key}: {} -> {}", change.old, change.new));
    }
    for (key, value) in &diff.removed {
        lines.push(format!("- {key}: {value}"));
    }
    lines
}

pub fn format_occurrence_lines(occurrences: &[Occurrence]) -> Vec<String> {
    occurrences
        .iter()
        .map(|occurrence| {
            format!(
                "{}  {}  {}",
                format_time(&occurrence.start_time),
                format_time(&occurrence.end_time),
                title_preview(&occurrence.title, 40)
            )
        })
        .collect()
}
