use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "votegate")]
#[command(about = "Voting-window gate for the student election client", long_about = None)]
pub struct Cli {
    /// Store holding the voting window (defaults to the platform data dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Settings file (defaults to the platform data dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Keep the countdown on screen and follow window changes (default)
    Watch,

    /// Print the current voting phase once and exit
    Status {
        /// Evaluate at this instant instead of now (ISO-8601)
        #[arg(long, value_name = "INSTANT")]
        at: Option<String>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a new voting window
    Set {
        /// Opening instant (ISO-8601; no offset means local time)
        #[arg(long)]
        start: String,

        /// Closing instant (ISO-8601; no offset means local time)
        #[arg(long)]
        end: String,
    },

    /// Remove the stored window so the default window applies
    Clear,

    /// Show the active voting window and where it comes from
    Show,

    /// Show or change runtime settings
    Settings {
        /// Tick interval in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// How often to check the store for changes, in milliseconds
        #[arg(long)]
        poll_ms: Option<u64>,

        /// Enable or disable toast notifications
        #[arg(long)]
        toasts: Option<bool>,
    },
}
