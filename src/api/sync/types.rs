use chansync_core::{RunTicket, SyncMode};
use serde::{Deserialize, Serialize};

/// Runs returned when `limit` is omitted
pub const DEFAULT_RUN_LIMIT: i64 = 50;
/// Upper bound for `limit`
pub const MAX_RUN_LIMIT: i64 = 500;

/// Request to start a manual sync
#[derive(Debug, Deserialize)]
pub struct SyncRequestBody {
    #[serde(default = "default_mode")]
    pub mode: SyncMode,
    /// Omit to sync every enabled channel
    #[serde(default)]
    pub channel_id: Option<String>,
}

fn default_mode() -> SyncMode {
    SyncMode::Incremental
}

/// Acknowledgment of a manual sync
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SyncAccepted {
    /// One channel; poll the run log with `run_id`
    Run(RunTicket),
    /// Every enabled channel, run in the background
    All { accepted: &'static str, mode: SyncMode },
}

/// Request to cancel one channel's run, or all runs
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequestBody {
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// Query for run history
#[derive(Debug, Default, Deserialize)]
pub struct ListRunsQuery {
    pub limit: Option<i64>,
}

/// Query for running runs
#[derive(Debug, Default, Deserialize)]
pub struct RunningQuery {
    pub channel_id: Option<String>,
}

/// Trigger state after a schedule notification
#[derive(Debug, Serialize)]
pub struct ScheduleView {
    pub channel_id: String,
    pub armed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

/// Clamp a requested history size to `1..=MAX_RUN_LIMIT`
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT)
}
