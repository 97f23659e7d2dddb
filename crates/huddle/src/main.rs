//! Huddle: recurring status updates in chat threads
//!
//! Main binary with subcommands:
//! - `daemon`: Connect every team and run the scheduler
//! - `team`: Register and list teams
//! - `question`: Manage recurring questions
//! - `migrate`: Assign a team to questions stored without one

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse boolean from environment variable, accepting common truthy values.
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true.
/// Accepts "0", "false", "no", "off", "" (case-insensitive) as false.
fn parse_bool_env(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(format!(
            "invalid boolean value '{}', expected 1/true/yes/on or 0/false/no/off",
            s
        )),
    }
}

mod admin;
mod daemon;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Recurring status updates in chat threads", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "HUDDLE_DATABASE", default_value = "huddle.db")]
    database: PathBuf,

    /// Slack Web API base URL
    #[arg(
        long,
        global = true,
        env = "HUDDLE_SLACK_API_URL",
        default_value = huddle_slack::DEFAULT_API_URL
    )]
    slack_api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect every team and run the scheduler until interrupted
    Daemon {
        /// Base URL of the channel settings page
        #[arg(long, env = "HUDDLE_ROOT_URL", default_value = "http://localhost:8080")]
        root_url: String,

        /// Seconds to wait before the first scheduler tick
        #[arg(long, env = "HUDDLE_STARTUP_GRACE_SECS", default_value = "30")]
        startup_grace_secs: u64,

        /// Slash command name, without the leading slash
        #[arg(long, env = "HUDDLE_COMMAND", default_value = "huddle")]
        command: String,
    },

    /// Manage teams
    Team {
        #[command(subcommand)]
        command: TeamCommand,
    },

    /// Manage recurring questions
    Question {
        #[command(subcommand)]
        command: QuestionCommand,
    },

    /// Assign a team to questions stored before teams existed
    Migrate {
        /// Team id to assign
        #[arg(long)]
        team: String,
    },
}

#[derive(Subcommand)]
pub enum TeamCommand {
    /// Register a team from its bot token
    Add {
        /// Bot token
        #[arg(long, env = "HUDDLE_SLACK_TOKEN")]
        token: String,
    },

    /// List registered teams
    List,
}

#[derive(Subcommand)]
pub enum QuestionCommand {
    /// Create a question
    Add {
        /// Team id
        #[arg(long)]
        team: String,

        /// Channel id
        #[arg(long)]
        channel: String,

        /// Question text
        #[arg(long)]
        message: String,

        /// Participant user ids, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        users: Vec<String>,

        /// Five-field cron expression
        #[arg(long)]
        cron: String,

        /// Whether the question gets new rounds
        #[arg(long, value_parser = parse_bool_env, default_value = "true")]
        active: bool,
    },

    /// List questions, optionally for one channel of one team
    List {
        /// Team id
        #[arg(long, requires = "channel")]
        team: Option<String>,

        /// Channel id
        #[arg(long, requires = "team")]
        channel: Option<String>,
    },

    /// Post a new round of a question now
    Invoke {
        /// Question id
        id: u64,
    },

    /// Delete a question and its rounds
    Delete {
        /// Question id
        id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "huddle=info,huddle_scheduler=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            root_url,
            startup_grace_secs,
            command,
        } => {
            daemon::run(daemon::DaemonConfig {
                database: cli.database,
                slack_api_url: cli.slack_api_url,
                root_url,
                startup_grace: Duration::from_secs(startup_grace_secs),
                command,
            })
            .await
        }

        Commands::Team { command } => {
            admin::run_team_command(&cli.database, &cli.slack_api_url, command).await
        }

        Commands::Question { command } => {
            admin::run_question_command(&cli.database, &cli.slack_api_url, command).await
        }

        Commands::Migrate { team } => admin::run_migrate(&cli.database, &team),
    }
}
