use chronicle_core::{Actor, CalendarService, EventPatch};

use crate::commands::common::{parse_event_id, parse_time, print_json};
use crate::error::CliError;

#[derive(Default)]
pub struct UpdateArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub recurrence: Option<String>,
    pub no_recurrence: bool,
}

pub fn build_patch(args: &UpdateArgs) -> Result<EventPatch, CliError> {
    let mut patch = EventPatch {
        title: args.title.clone(),
        description: args.description.clone(),
        start_time: args.start.as_deref().map(parse_time).transpose()?,
        end_time: args.end.as_deref().map(parse_time).transpose()?,
        location: args.location.clone(),
        ..EventPatch::default()
    };

    if let Some(pattern) = &args.recurrence {
        patch.is_recurring = Some(true);
        patch.recurrence_pattern = Some(Some(pattern.clone()));
    } else if args.no_recurrence {
        patch.is_recurring = Some(false);
        patch.recurrence_pattern = Some(None);
    }

    Ok(patch)
}

pub fn run_update(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    args: &UpdateArgs,
    reason: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let event_id = parse_event_id(id)?;
    let event = service.update_event(actor, &event_id, build_patch(args)?, reason)?;

    if as_json {
        print_json(&event)?;
    } else {
        println!("{} v{}", event.id, event.version);
    }
    Ok(())
}

pub fn run_rollback(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    version: i64,
    as_json: bool,
) -> Result<(), CliError> {
    let event_id = parse_event_id(id)?;
    let event = service.rollback(actor, &event_id, version)?;

    if as_json {
        print_json(&event)?;
    } else {
        println!("{} v{} (restored v{version})", event.id, event.version);
    }
    Ok(())
}
