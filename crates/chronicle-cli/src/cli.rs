use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "chronicle")]
#[command(about = "Shared calendar events with version history and conflict detection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// User ID to act as (falls back to CHRONICLE_USER)
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    pub as_user: Option<String>,

    /// Act with administrator rights
    #[arg(long, global = true)]
    pub admin: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage user identities
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Create a new event
    #[command(alias = "new")]
    Create {
        /// Event title
        title: String,
        /// Start time (RFC 3339 or "YYYY-MM-DD HH:MM", UTC)
        #[arg(long, value_name = "TIME")]
        start: String,
        /// End time (RFC 3339 or "YYYY-MM-DD HH:MM", UTC)
        #[arg(long, value_name = "TIME")]
        end: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// Recurrence pattern, e.g. FREQ=WEEKLY;INTERVAL=2
        #[arg(long, value_name = "PATTERN")]
        recurrence: Option<String>,
        /// Share on creation (USER_ID or USER_ID:ROLE, repeatable)
        #[arg(long = "share", value_name = "GRANT")]
        shares: Vec<String>,
    },
    /// Update an event, recording a new version
    Update {
        /// Event ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_name = "TIME")]
        start: Option<String>,
        #[arg(long, value_name = "TIME")]
        end: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// New recurrence pattern (makes the event recurring)
        #[arg(long, value_name = "PATTERN", conflicts_with = "no_recurrence")]
        recurrence: Option<String>,
        /// Stop the event from recurring
        #[arg(long)]
        no_recurrence: bool,
        /// Reason stored with the new version
        #[arg(short, long, default_value = "")]
        reason: String,
    },
    /// Delete an event
    Delete {
        /// Event ID
        id: String,
    },
    /// Grant roles on an event
    Share {
        /// Event ID
        id: String,
        /// USER_ID or USER_ID:ROLE (owner, editor, viewer; default viewer)
        #[arg(required = true, value_name = "GRANT")]
        grants: Vec<String>,
    },
    /// Remove a user's role on an event
    Revoke {
        /// Event ID
        id: String,
        /// User whose role is removed
        user_id: String,
    },
    /// List roles on an event
    Permissions {
        /// Event ID
        id: String,
    },
    /// List stored versions of an event
    History {
        /// Event ID
        id: String,
    },
    /// Show the change log of an event
    Changelog {
        /// Event ID
        id: String,
    },
    /// Compare two versions of an event
    Diff {
        /// Event ID
        id: String,
        /// Older version number
        from: i64,
        /// Newer version number
        to: i64,
    },
    /// Restore an earlier version as a new version
    Rollback {
        /// Event ID
        id: String,
        /// Version number to restore
        version: i64,
    },
    /// Create events from a JSON array, all or nothing
    Batch {
        /// JSON file (stdin when omitted)
        #[arg(value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Show an event, or one of its versions
    Show {
        /// Event ID
        id: String,
        /// Show this stored version instead of the live event
        #[arg(long)]
        version: Option<i64>,
    },
    /// List events you hold a role on
    List,
    /// List conflicts involving an event
    Conflicts {
        /// Event ID
        id: String,
    },
    /// Resolve or ignore a pending conflict
    Resolve {
        /// Conflict ID
        conflict_id: i64,
        #[arg(long, value_enum, default_value_t = Resolution::Resolved)]
        status: Resolution,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Expand a recurring event within a window
    Occurrences {
        /// Event ID
        id: String,
        #[arg(long, value_name = "TIME")]
        from: String,
        #[arg(long, value_name = "TIME")]
        to: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user
    Add {
        /// Unique username
        username: String,
    },
    /// Show a user
    Show {
        /// User ID
        id: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Resolution {
    Resolved,
    Ignored,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
