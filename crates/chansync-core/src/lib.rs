//! Chansync Core - Sync Scheduling Engine
//!
//! This crate schedules and runs per-channel sync jobs, including:
//! - Schedule: one recurring cron trigger per enabled channel
//! - Orchestrator: single-flight runs with a recorded lifecycle
//! - Cancellation: cooperative stop requests polled at checkpoints
//! - Run log: durable history of every run in SQLite
//! - Pipeline: the fetch/download step behind a trait

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cancellation;
pub mod channels;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod run_log;
pub mod schedule;
pub mod types;

#[cfg(test)]
mod test_support;

pub use cancellation::CancellationRegistry;
pub use channels::{ChannelStore, SqliteChannelStore};
pub use error::{Result, SyncError};
pub use orchestrator::{ActiveRun, PreparedRun, SyncOrchestrator};
pub use pipeline::{Checkpoint, CommandPipeline, PipelineError, SyncPipeline, SyncRequest};
pub use run_log::RunLogStore;
pub use schedule::{
    normalize_cron, run_batch, CronDriver, ManualOutcome, ScheduleManager, TriggerCallback,
    TriggerDriver, TriggerFuture, TriggerHandle, DEFAULT_SCHEDULE,
};
pub use types::{
    BatchSummary, CancelReport, Channel, RunOutcome, RunState, RunTicket, SyncMode, SyncRun,
    CANCELLED_BY_USER, INTERRUPTED_BY_RESTART,
};
