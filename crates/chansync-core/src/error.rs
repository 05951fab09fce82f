//! Error types for chansync-core

use thiserror::Error;
use uuid::Uuid;

use crate::types::RunState;

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync subsystem error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Referenced channel does not exist
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// A run for the channel is already in flight
    #[error("sync already running for channel {0}")]
    AlreadyRunning(String),

    /// The fetch/download pipeline raised an error
    #[error("sync of {channel_id} failed: {message}")]
    PipelineFailed {
        /// Channel the run belonged to
        channel_id: String,
        /// Run record that was closed as failed
        run_id: Uuid,
        /// Pipeline error message
        message: String,
    },

    /// Closing a run record that does not exist
    #[error("run record not found: {0}")]
    RunNotFound(Uuid),

    /// Closing a run record that already left the running state
    #[error("run {run_id} is already {state}")]
    InvalidTransition {
        /// Run record ID
        run_id: Uuid,
        /// State the record is currently in
        state: RunState,
    },

    /// Recurrence expression could not be parsed
    #[error("invalid schedule '{expression}': {reason}")]
    InvalidSchedule {
        /// Expression as configured on the channel
        expression: String,
        /// Parser message
        reason: String,
    },

    /// Cron scheduler failure
    #[error("scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    /// Stored row could not be decoded
    #[error("invalid stored value: {0}")]
    InvalidData(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

