use chronicle_core::{Actor, CalendarService};

use crate::commands::common::parse_event_id;
use crate::error::CliError;

pub fn run_delete(service: &CalendarService, actor: &Actor, id: &str) -> Result<(), CliError> {
    let event_id = parse_event_id(id)?;
    service.delete_event(actor, &event_id)?;
    println!("{event_id}");
    Ok(())
}
