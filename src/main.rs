//! Chansync - Scheduled Channel Synchronization
//!
//! CLI entry point for the Chansync server.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chansync=info,chansync_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = cli::Cli::parse();

    if matches!(cli.command, None | Some(cli::Commands::Serve)) {
        info!("Starting Chansync v{}", env!("CARGO_PKG_VERSION"));
    }

    cli::run(cli).await
}
