//! Shared sync types
//!
//! Channels, run records and the values returned by the control surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Error detail recorded on runs stopped by a cancellation request
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

/// Error detail recorded on runs left `running` by a previous process
pub const INTERRUPTED_BY_RESTART: &str = "Interrupted: process restarted";

/// How much of a channel a run synchronizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Only items newer than the last sync
    Incremental,
    /// Everything the channel exposes
    Full,
}

impl SyncMode {
    /// Stable string form used in storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "incremental" => Ok(Self::Incremental),
            "full" => Ok(Self::Full),
            other => Err(SyncError::InvalidData(format!("unknown sync mode: {}", other))),
        }
    }
}

/// Run lifecycle state
///
/// `Running` is the only non-terminal state; no transition leaves a terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Pipeline work in progress
    Running,
    /// Pipeline finished normally
    Completed,
    /// Pipeline raised an error
    Failed,
    /// Stopped by a cancellation request
    Cancelled,
}

impl RunState {
    /// Stable string form used in storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the state is final
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(SyncError::InvalidData(format!("unknown run state: {}", other))),
        }
    }
}

/// A configured sync source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Externally assigned identifier
    pub id: String,
    /// Cron expression; `None` or empty means the default cadence
    pub schedule: Option<String>,
    /// Whether recurring sync is enabled
    pub enabled: bool,
    /// Opaque credential blob handed to the pipeline
    #[serde(skip_serializing)]
    pub credentials: Option<String>,
}

impl Channel {
    /// Create an enabled channel with the default cadence
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schedule: None,
            enabled: true,
            credentials: None,
        }
    }

    /// Set the cron expression
    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Set the credential blob
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Mark the channel as disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Configured schedule, ignoring blank values
    #[must_use]
    pub fn configured_schedule(&self) -> Option<&str> {
        self.schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One sync attempt as recorded in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    /// Run ID
    pub id: Uuid,
    /// Channel the run synchronizes
    pub channel_id: String,
    /// Sync mode
    pub mode: SyncMode,
    /// Current state
    pub state: RunState,
    /// Creation time
    pub started_at: DateTime<Utc>,
    /// Set on the terminal transition
    pub completed_at: Option<DateTime<Utc>>,
    /// Error detail for failed/cancelled runs
    pub error: Option<String>,
}

/// Result of a run that reached a terminal state without a pipeline failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// Run ID
    pub run_id: Uuid,
    /// Channel ID
    pub channel_id: String,
    /// Sync mode
    pub mode: SyncMode,
    /// Terminal state (`completed` or `cancelled`)
    pub state: RunState,
}

/// Acknowledgment for a run spawned in the background
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunTicket {
    /// Run ID to poll in the run log
    pub run_id: Uuid,
    /// Channel ID
    pub channel_id: String,
    /// Sync mode
    pub mode: SyncMode,
}

/// Aggregate result of a "sync all" batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Channels the batch tried to run
    pub attempted: usize,
    /// Runs that completed
    pub completed: usize,
    /// Runs that failed (pipeline or bookkeeping)
    pub failed: usize,
    /// Runs that were cancelled
    pub cancelled: usize,
    /// Channels skipped because a run was already in flight
    pub rejected: usize,
}

/// What a cancellation request did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CancelReport {
    /// Channels with a live run that were flagged
    pub flagged: Vec<String>,
    /// Stale `running` records forced to `cancelled`
    pub reconciled: u64,
}

/// Internal row type for run queries
#[derive(FromRow)]
pub(crate) struct RunRow {
    pub id: String,
    pub channel_id: String,
    pub mode: String,
    pub state: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TryFrom<RunRow> for SyncRun {
    type Error = SyncError;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(SyncRun {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| SyncError::InvalidData(format!("Invalid run ID: {}", e)))?,
            channel_id: row.channel_id,
            mode: row.mode.parse()?,
            state: row.state.parse()?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error: row.error,
        })
    }
}

/// Internal row type for channel queries
#[derive(FromRow)]
pub(crate) struct ChannelRow {
    pub id: String,
    pub schedule: Option<String>,
    pub enabled: bool,
    pub credentials: Option<String>,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Channel {
            id: row.id,
            schedule: row.schedule,
            enabled: row.enabled,
            credentials: row.credentials,
        }
    }
}
