use chronicle_core::{Actor, CalendarService};

use crate::commands::common::{
    format_event_details, format_event_lines, format_timestamp, parse_event_id, print_json,
    print_lines,
};
use crate::error::CliError;

pub fn run_show(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    version: Option<i64>,
    as_json: bool,
) -> Result<(), CliError> {
    let event_id = parse_event_id(id)?;

    let Some(number) = version else {
        let event = service.get_event(actor, &event_id)?;
        if as_json {
            print_json(&event)?;
        } else {
            print_lines(&format_event_details(&event));
        }
        return Ok(());
    };

    let stored = service.get_version(actor, &event_id, number)?;
    if as_json {
        print_json(&stored)?;
    } else {
        println!(
            "version {} of {} ({}, {})",
            stored.version_number,
            stored.event_id,
            format_timestamp(stored.created_at),
            stored.change_reason
        );
        println!("{}", serde_json::to_string_pretty(&stored.data)?);
    }
    Ok(())
}

pub fn run_list(service: &CalendarService, actor: &Actor, as_json: bool) -> Result<(), CliError> {
    let events = service.list_events(actor)?;

    if as_json {
        print_json(&events)?;
    } else {
        print_lines(&format_event_lines(&events));
    }
    Ok(())
}
