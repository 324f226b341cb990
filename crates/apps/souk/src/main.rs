//! Souk - headless client for the Souk chat core
//!
//! Opens the local message database, replays backend snapshots into it and
//! prints the conversation list the mobile app would show. Also talks to
//! the shopping assistant.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

mod commands;

#[derive(Parser)]
#[command(name = "souk")]
#[command(about = "Inspect and replay the Souk chat database")]
struct Cli {
    /// Path to the SQLite database (defaults to the Souk data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// User the conversations belong to (defaults to the saved settings)
    #[arg(long, short, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a JSON snapshot (array of message records) into the database
    Import {
        /// Snapshot file
        path: PathBuf,
    },

    /// Print conversations, most recent first
    List {
        /// Fetch store names from the backend
        #[arg(long)]
        resolve: bool,
    },

    /// Print the messages exchanged with one store
    Show {
        /// Store ID
        store_id: String,
    },

    /// Print the unread badge count
    Unread,

    /// Ask the shopping assistant for products near the saved position
    Ask {
        /// What you are looking for
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Print the assistant conversation
    AssistantLog,

    /// Delete every assistant conversation entry
    PurgeAssistant,

    /// Show or update saved settings
    Settings {
        /// Store search radius in kilometres
        #[arg(long)]
        distance: Option<u32>,
        /// Last known latitude
        #[arg(long, requires = "longitude", allow_hyphen_values = true)]
        latitude: Option<f64>,
        /// Last known longitude
        #[arg(long, requires = "latitude", allow_hyphen_values = true)]
        longitude: Option<f64>,
        /// Signed-in user ID
        #[arg(long)]
        user_id: Option<String>,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Import { path } => commands::import(cli.db, &path),
        Commands::List { resolve } => commands::list(cli.db, cli.user, resolve),
        Commands::Show { store_id } => commands::show(cli.db, &store_id),
        Commands::Unread => commands::unread(cli.db),
        Commands::Ask { query } => commands::ask(cli.db, cli.user, &query.join(" ")),
        Commands::AssistantLog => commands::assistant_log(cli.db),
        Commands::PurgeAssistant => commands::purge_assistant(cli.db),
        Commands::Settings {
            distance,
            latitude,
            longitude,
            user_id,
        } => commands::settings(distance, latitude.zip(longitude), user_id),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
