//! Chronicle CLI - shared calendar events from the command line
//!
//! Every event command runs as the user given by `--as` (or
//! `CHRONICLE_USER`) and goes through the same `CalendarService` checks as
//! any other client.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, UserCommands};
use crate::commands::common::{open_service, resolve_actor, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::conflicts::{run_conflicts, run_resolve};
use crate::commands::create::{run_batch, run_create, CreateArgs};
use crate::commands::delete::run_delete;
use crate::commands::history::{run_changelog, run_diff, run_history};
use crate::commands::occurrences::run_occurrences;
use crate::commands::share::{run_permissions, run_revoke, run_share};
use crate::commands::show::{run_list, run_show};
use crate::commands::update::{run_rollback, run_update, UpdateArgs};
use crate::commands::users::{run_user_add, run_user_show};
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chronicle=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let as_json = cli.json;

    let command = match cli.command {
        Commands::Completions { shell, output } => {
            return run_completions(shell, output.as_deref());
        }
        command => command,
    };

    let service = open_service(&resolve_db_path(cli.db_path))?;

    let command = match command {
        Commands::User { command } => {
            return match command {
                UserCommands::Add { username } => run_user_add(&service, &username, as_json),
                UserCommands::Show { id } => run_user_show(&service, &id, as_json),
            };
        }
        command => command,
    };

    let actor = resolve_actor(cli.as_user, cli.admin)?;

    match command {
        Commands::Create {
            title,
            start,
            end,
            description,
            location,
            recurrence,
            shares,
        } => {
            let args = CreateArgs {
                title,
                start,
                end,
                description,
                location,
                recurrence,
                shares,
            };
            run_create(&service, &actor, &args, as_json)?;
        }
        Commands::Update {
            id,
            title,
            description,
            start,
            end,
            location,
            recurrence,
            no_recurrence,
            reason,
        } => {
            let args = UpdateArgs {
                title,
                description,
                start,
                end,
                location,
                recurrence,
                no_recurrence,
            };
            run_update(&service, &actor, &id, &args, &reason, as_json)?;
        }
        Commands::Delete { id } => run_delete(&service, &actor, &id)?,
        Commands::Share { id, grants } => run_share(&service, &actor, &id, &grants, as_json)?,
        Commands::Revoke { id, user_id } => {
            run_revoke(&service, &actor, &id, &user_id, as_json)?;
        }
        Commands::Permissions { id } => run_permissions(&service, &actor, &id, as_json)?,
        Commands::History { id } => run_history(&service, &actor, &id, as_json)?,
        Commands::Changelog { id } => run_changelog(&service, &actor, &id, as_json)?,
        Commands::Diff { id, from, to } => run_diff(&service, &actor, &id, from, to, as_json)?,
        Commands::Rollback { id, version } => {
            run_rollback(&service, &actor, &id, version, as_json)?;
        }
        Commands::Batch { file } => run_batch(&service, &actor, file.as_deref(), as_json)?,
        Commands::Show { id, version } => run_show(&service, &actor, &id, version, as_json)?,
        Commands::List => run_list(&service, &actor, as_json)?,
        Commands::Conflicts { id } => run_conflicts(&service, &actor, &id, as_json)?,
        Commands::Resolve {
            conflict_id,
            status,
            notes,
        } => run_resolve(&service, &actor, conflict_id, status, &notes, as_json)?,
        Commands::Occurrences { id, from, to } => {
            run_occurrences(&service, &actor, &id, &from, &to, as_json)?;
        }
        Commands::User { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
