//! CLI module for Chansync
//!
//! Provides commands:
//! - `serve`: Run the scheduler and HTTP control surface (default)
//! - `sync`: Run one channel, or all enabled channels, in the foreground
//! - `status`: Print run history

use clap::{Parser, Subcommand};

pub mod status;
pub mod sync;

/// Chansync CLI
#[derive(Parser, Debug)]
#[command(name = "chansync")]
#[command(about = "Scheduled channel synchronization")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// Run a sync now and wait for it to finish
    Sync {
        /// Full sync instead of incremental
        #[arg(long)]
        full: bool,
        /// Channel to sync; all enabled channels when omitted
        channel: Option<String>,
    },
    /// Show recent runs
    Status {
        /// Number of runs to show
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
        /// Only show runs still in progress
        #[arg(long)]
        running: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None | Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::Sync { full, channel }) => sync::run(full, channel).await,
        Some(Commands::Status { limit, running }) => status::run(limit, running).await,
    }
}
