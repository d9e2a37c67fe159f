use std::io::{self, Read};
use std::path::Path;

use chronicle_core::{Actor, CalendarService, NewEvent};

use crate::commands::common::{
    format_event_lines, parse_grant, parse_time, print_json, print_lines,
};
use crate::error::CliError;

pub struct CreateArgs {
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub recurrence: Option<String>,
    pub shares: Vec<String>,
}

pub fn build_new_event(args: &CreateArgs) -> Result<NewEvent, CliError> {
    let mut input = NewEvent::new(
        args.title.clone(),
        parse_time(&args.start)?,
        parse_time(&args.end)?,
    );
    if let Some(description) = &args.description {
        input = input.with_description(description.clone());
    }
    if let Some(location) = &args.location {
        input = input.with_location(location.clone());
    }
    if let Some(pattern) = &args.recurrence {
        input = input.with_recurrence(pattern.clone());
    }
    Ok(input)
}

pub fn run_create(
    service: &CalendarService,
    actor: &Actor,
    args: &CreateArgs,
    as_json: bool,
) -> Result<(), CliError> {
    let input = build_new_event(args)?;
    let grants = args
        .shares
        .iter()
        .map(|raw| parse_grant(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let event = service.create_event(actor, input, grants)?;

    if as_json {
        print_json(&event)?;
    } else {
        println!("{}", event.id);
    }
    Ok(())
}

/// Parse a JSON array of events.
pub fn parse_batch(payload: &str) -> Result<Vec<NewEvent>, CliError> {
    serde_json::from_str(payload).map_err(|error| CliError::InvalidBatch(error.to_string()))
}

pub fn run_batch(
    service: &CalendarService,
    actor: &Actor,
    file: Option<&Path>,
    as_json: bool,
) -> Result<(), CliError> {
    let payload = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().lock().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let events = service.batch_create(actor, parse_batch(&payload)?)?;

    if as_json {
        print_json(&events)?;
    } else {
        print_lines(&format_event_lines(&events));
    }
    Ok(())
}
