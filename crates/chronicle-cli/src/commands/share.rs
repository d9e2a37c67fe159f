use chronicle_core::{Actor, CalendarService};

use crate::commands::common::{
    format_permission_lines, parse_event_id, parse_grant, parse_user_id, print_json, print_lines,
};
use crate::error::CliError;

pub fn run_share(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    raw_grants: &[String],
    as_json: bool,
) -> Result<(), CliError> {
    let event_id = parse_event_id(id)?;
    let grants = raw_grants
        .iter()
        .map(|raw| parse_grant(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let permissions = service.share_event(actor, &event_id, grants)?;

    if as_json {
        print_json(&permissions)?;
    } else {
        print_lines(&format_permission_lines(&permissions));
    }
    Ok(())
}

pub fn run_revoke(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    user_id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let event_id = parse_event_id(id)?;
    let removed = service.revoke_permission(actor, &event_id, &parse_user_id(user_id)?)?;

    if as_json {
        print_json(&removed)?;
    } else {
        println!("revoked {} from {}", removed.role.as_str(), removed.user_id);
    }
    Ok(())
}

pub fn run_permissions(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let permissions = service.list_permissions(actor, &parse_event_id(id)?)?;

    if as_json {
        print_json(&permissions)?;
    } else {
        print_lines(&format_permission_lines(&permissions));
    }
    Ok(())
}
