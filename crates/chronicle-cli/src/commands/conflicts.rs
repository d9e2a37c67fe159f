use chronicle_core::{Actor, CalendarService, ConflictStatus};

use crate::cli::Resolution;
use crate::commands::common::{format_conflict_lines, parse_event_id, print_json, print_lines};
use crate::error::CliError;

pub const fn resolution_status(resolution: Resolution) -> ConflictStatus {
    match resolution {
        Resolution::Resolved => ConflictStatus::Resolved,
        Resolution::Ignored => ConflictStatus::Ignored,
    }
}

pub fn run_conflicts(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let conflicts = service.list_conflicts(actor, &parse_event_id(id)?)?;

    if as_json {
        print_json(&conflicts)?;
    } else {
        print_lines(&format_conflict_lines(&conflicts));
    }
    Ok(())
}

pub fn run_resolve(
    service: &CalendarService,
    actor: &Actor,
    conflict_id: i64,
    resolution: Resolution,
    notes: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let conflict =
        service.resolve_conflict(actor, conflict_id, resolution_status(resolution), notes)?;

    if as_json {
        print_json(&conflict)?;
    } else {
        print_lines(&format_conflict_lines(std::slice::from_ref(&conflict)));
    }
    Ok(())
}
