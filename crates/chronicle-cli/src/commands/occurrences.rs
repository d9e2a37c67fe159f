use chronicle_core::{Actor, CalendarService};

use crate::commands::common::{
    format_occurrence_lines, parse_event_id, parse_time, print_json, print_lines,
};
use crate::error::CliError;

pub fn run_occurrences(
    service: &CalendarService,
    actor: &Actor,
    id: &str,
    from: &str,
    to: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let occurrences = service.expand_occurrences(
        actor,
        &parse_event_id(id)?,
        parse_time(from)?,
        parse_time(to)?,
    )?;

    if as_json {
        print_json(&occurrences)?;
    } else {
        print_lines(&format_occurrence_lines(&occurrences));
    }
    Ok(())
}
