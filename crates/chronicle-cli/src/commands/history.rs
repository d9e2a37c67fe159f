use chrono::Utc;
use chronicle_core::{Actor, CalendarService};

use crate::commands::common::{
    format_changelog_lines, format_diff_lines, format_version_lines, parse_event_id, print_json,
    print_lines,
};
use crate::error::CliError;

pub fn run_history(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let versions = service.list_history(actor, &parse_event_id(id)?)?;

    if as_json {
        print_json(&versions)?;
    } else {
        print_lines(&format_version_lines(&versions));
    }
    Ok(())
}

pub fn run_changelog(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let entries = service.list_changelog(actor, &parse_event_id(id)?)?;

    if as_json {
        print_json(&entries)?;
    } else {
        let now_ms = Utc::now().timestamp_millis();
        print_lines(&format_changelog_lines(&entries, now_ms));
    }
    Ok(())
}

pub fn run_diff(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    from: i64,
    to: i64,
    as_json: bool,
) -> Result<(), CliError> {
    let diff = service.diff_versions(actor, &parse_event_id(id)?, from, to)?;

    if as_json {
        print_json(&diff)?;
    } else {
        print_lines(&format_diff_lines(&diff));
    }
    Ok(())
}
