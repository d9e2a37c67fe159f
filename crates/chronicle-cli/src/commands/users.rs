use chronicle_core::CalendarService;

use crate::commands::common::{format_timestamp, parse_user_id, print_json};
use crate::error::CliError;

pub fn run_user_add(
    service: &CalendarService,
    username: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let user = service.create_user(username)?;

    if as_json {
        print_json(&user)?;
    } else {
        println!("{}", user.id);
    }
    Ok(())
}

pub fn run_user_show(service: &CalendarService, id: &str, as_json: bool) -> Result<(), CliError> {
    let user = service.get_user(&parse_user_id(id)?)?;

    if as_json {
        print_json(&user)?;
    } else {
        println!(
            "{}  {}  created {}",
            user.id,
            user.username,
            format_timestamp(user.created_at)
        );
    }
    Ok(())
}
