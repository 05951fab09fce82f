//! Run history

use anyhow::{Context, Result};
use chansync_core::SyncRun;

use crate::server::{build_components, load_config};

/// Print recent runs, or only those still running
pub async fn run(limit: i64, running: bool) -> Result<()> {
    let config = load_config()?;
    let components = build_components(&config).await?;

    let runs = if running {
        components.run_log.running_for(None).await
    } else {
        components.run_log.latest(limit.max(1)).await
    }
    .context("Failed to read run log")?;

    if runs.is_empty() {
        println!("No runs recorded");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<11}  {:<9}  {:<20}  ERROR",
        "RUN", "CHANNEL", "MODE", "STATE", "STARTED"
    );
    for run in &runs {
        println!("{}", format_row(run));
    }
    Ok(())
}

fn format_row(run: &SyncRun) -> String {
    format!(
        "{:<36}  {:<20}  {:<11}  {:<9}  {:<20}  {}",
        run.id,
        run.channel_id,
        run.mode.as_str(),
        run.state.as_str(),
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        run.error.as_deref().unwrap_or("-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chansync_core::{RunState, SyncMode};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_format_row() {
        let run = SyncRun {
            id: Uuid::nil(),
            channel_id: "news".to_string(),
            mode: SyncMode::Full,
            state: RunState::Failed,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            error: Some("HTTP 500".to_string()),
        };

        let row = format_row(&run);
        assert!(row.starts_with("00000000-0000-0000-0000-000000000000"));
        assert!(row.contains("news"));
        assert!(row.contains("failed"));
        assert!(row.ends_with("HTTP 500"));
    }
}
