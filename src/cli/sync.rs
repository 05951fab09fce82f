//! Foreground sync

use anyhow::{Context, Result};
use chansync_core::{run_batch, RunState, SyncError, SyncMode};

use crate::server::{build_components, load_config};

/// Run one channel (or every enabled channel) and print the outcome
pub async fn run(full: bool, channel: Option<String>) -> Result<()> {
    let config = load_config()?;
    let components = build_components(&config).await?;
    let orchestrator = components.orchestrator;
    let mode = if full {
        SyncMode::Full
    } else {
        SyncMode::Incremental
    };

    match channel {
        Some(channel_id) => match orchestrator.run(&channel_id, mode).await {
            Ok(outcome) => {
                println!(
                    "{} {} sync {} (run {})",
                    outcome.channel_id, outcome.mode, outcome.state, outcome.run_id
                );
                if outcome.state == RunState::Cancelled {
                    anyhow::bail!("Sync of {} was cancelled", channel_id);
                }
                Ok(())
            }
            Err(SyncError::PipelineFailed {
                channel_id,
                run_id,
                message,
            }) => {
                anyhow::bail!("{} sync failed (run {}): {}", channel_id, run_id, message)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to sync {}", channel_id)),
        },
        None => {
            let summary = run_batch(orchestrator.channels().as_ref(), &orchestrator, mode)
                .await
                .context("Failed to list channels")?;
            println!(
                "{} channels: {} completed, {} failed, {} cancelled, {} already running",
                summary.attempted,
                summary.completed,
                summary.failed,
                summary.cancelled,
                summary.rejected
            );
            if summary.failed > 0 {
                anyhow::bail!("{} of {} syncs failed", summary.failed, summary.attempted);
            }
            Ok(())
        }
    }
}
