//! Sync orchestrator
//!
//! Executes one run for one channel:
//! - claims the channel's single-flight slot
//! - opens a `running` record in the run log
//! - invokes the pipeline, honoring cancellation at checkpoints
//! - closes the record with a terminal state
//!
//! ```text
//!            ┌──────────┐
//!  prepare → │ running  │ → completed
//!            └────┬─────┘ → failed     (error propagated)
//!                 └───────→ cancelled  (not an error)
//! ```

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cancellation::CancellationRegistry;
use crate::channels::ChannelStore;
use crate::error::{Result, SyncError};
use crate::pipeline::{Checkpoint, PipelineError, SyncPipeline, SyncRequest};
use crate::run_log::RunLogStore;
use crate::types::{
    CancelReport, Channel, RunOutcome, RunState, RunTicket, SyncMode, CANCELLED_BY_USER,
};

/// A run holding its channel's slot in the active-run map
#[derive(Debug, Clone, Serialize)]
pub struct ActiveRun {
    /// Run record ID, unset until the record is opened
    pub run_id: Option<Uuid>,
    /// Sync mode
    pub mode: SyncMode,
    /// When the slot was claimed
    pub claimed_at: DateTime<Utc>,
}

/// Releases a channel's slot when dropped
struct RunSlot {
    channel_id: String,
    active_runs: Arc<DashMap<String, ActiveRun>>,
}

impl RunSlot {
    fn bind(&self, run_id: Uuid) {
        if let Some(mut active) = self.active_runs.get_mut(&self.channel_id) {
            active.run_id = Some(run_id);
        }
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.active_runs.remove(&self.channel_id);
    }
}

/// A run whose record is open and whose pipeline has not started yet
pub struct PreparedRun {
    channel: Channel,
    mode: SyncMode,
    run_id: Uuid,
    _slot: RunSlot,
}

impl PreparedRun {
    /// Run record ID
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Acknowledgment for callers that do not wait on the run
    #[must_use]
    pub fn ticket(&self) -> RunTicket {
        RunTicket {
            run_id: self.run_id,
            channel_id: self.channel.id.clone(),
            mode: self.mode,
        }
    }
}

/// Executes sync runs, one at a time per channel
pub struct SyncOrchestrator {
    channels: Arc<dyn ChannelStore>,
    run_log: Arc<RunLogStore>,
    cancellations: Arc<CancellationRegistry>,
    pipeline: Arc<dyn SyncPipeline>,
    active_runs: Arc<DashMap<String, ActiveRun>>,
}

impl SyncOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        channels: Arc<dyn ChannelStore>,
        run_log: Arc<RunLogStore>,
        cancellations: Arc<CancellationRegistry>,
        pipeline: Arc<dyn SyncPipeline>,
    ) -> Self {
        Self {
            channels,
            run_log,
            cancellations,
            pipeline,
            active_runs: Arc::new(DashMap::new()),
        }
    }

    /// Get the run log
    #[must_use]
    pub fn run_log(&self) -> &Arc<RunLogStore> {
        &self.run_log
    }

    /// Get the channel store
    #[must_use]
    pub fn channels(&self) -> &Arc<dyn ChannelStore> {
        &self.channels
    }

    /// Get the cancellation registry
    #[must_use]
    pub fn cancellations(&self) -> &Arc<CancellationRegistry> {
        &self.cancellations
    }

    /// Whether a run for the channel is in flight in this process
    #[must_use]
    pub fn is_running(&self, channel_id: &str) -> bool {
        self.active_runs.contains_key(channel_id)
    }

    /// Snapshot of runs in flight in this process
    #[must_use]
    pub fn active_runs(&self) -> Vec<(String, ActiveRun)> {
        self.active_runs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Run a channel to completion
    ///
    /// Returns the outcome for completed and cancelled runs; a pipeline failure
    /// is recorded and then returned as [`SyncError::PipelineFailed`].
    pub async fn run(&self, channel_id: &str, mode: SyncMode) -> Result<RunOutcome> {
        let prepared = self.prepare(channel_id, mode).await?;
        self.execute(prepared).await
    }

    /// Claim the channel and open its run record without starting the pipeline
    ///
    /// Fails with [`SyncError::ChannelNotFound`] or [`SyncError::AlreadyRunning`]
    /// before anything is written to the run log.
    pub async fn prepare(&self, channel_id: &str, mode: SyncMode) -> Result<PreparedRun> {
        let channel = self
            .channels
            .get(channel_id)
            .await?
            .ok_or_else(|| SyncError::ChannelNotFound(channel_id.to_string()))?;

        let slot = self.claim(channel_id, mode)?;
        self.open_claimed(channel, mode, slot).await
    }

    /// Open the run record for a channel whose slot is already held
    async fn open_claimed(
        &self,
        channel: Channel,
        mode: SyncMode,
        slot: RunSlot,
    ) -> Result<PreparedRun> {
        let channel_id = channel.id.as_str();

        // A record still running without a live slot belongs to another process
        // or was never reconciled; either way the channel is busy.
        if !self.run_log.running_for(Some(channel_id)).await?.is_empty() {
            warn!(channel_id = %channel_id, "Run log already has a running record");
            return Err(SyncError::AlreadyRunning(channel_id.to_string()));
        }

        let run_id = self.run_log.open(channel_id, mode).await?;
        slot.bind(run_id);

        info!(channel_id = %channel_id, run_id = %run_id, mode = %mode, "Sync run started");

        Ok(PreparedRun {
            channel,
            mode,
            run_id,
            _slot: slot,
        })
    }

    /// Drive a prepared run through the pipeline and close its record
    pub async fn execute(&self, run: PreparedRun) -> Result<RunOutcome> {
        let channel_id = run.channel.id.as_str();
        let checkpoint = Checkpoint::new(channel_id, self.cancellations.clone());

        let result = match checkpoint.check() {
            Ok(()) => {
                let request = SyncRequest {
                    channel_id,
                    credentials: run.channel.credentials.as_deref(),
                    mode: run.mode,
                };
                self.pipeline.run(request, &checkpoint).await
            }
            Err(cancelled) => Err(cancelled),
        };

        // Completion is the final checkpoint; cancellation wins over any
        // pipeline result.
        let cancelled = checkpoint.poll() || matches!(result, Err(PipelineError::Cancelled));

        let (state, detail) = if cancelled {
            (RunState::Cancelled, Some(CANCELLED_BY_USER.to_string()))
        } else {
            match result {
                Ok(()) => (RunState::Completed, None),
                Err(e) => (RunState::Failed, Some(e.to_string())),
            }
        };

        if let Err(e) = self.run_log.close(run.run_id, state, detail.as_deref()).await {
            error!(channel_id = %channel_id, run_id = %run.run_id, "Failed to close run record: {}", e);
            return Err(e);
        }

        match state {
            RunState::Failed => {
                let message = detail.unwrap_or_default();
                warn!(channel_id = %channel_id, run_id = %run.run_id, "Sync run failed: {}", message);
                Err(SyncError::PipelineFailed {
                    channel_id: channel_id.to_string(),
                    run_id: run.run_id,
                    message,
                })
            }
            _ => {
                info!(channel_id = %channel_id, run_id = %run.run_id, state = %state, "Sync run finished");
                Ok(RunOutcome {
                    run_id: run.run_id,
                    channel_id: channel_id.to_string(),
                    mode: run.mode,
                    state,
                })
            }
        }
    }

    /// Request cancellation of one channel's run, or of all runs
    ///
    /// Live runs are flagged and resolve the request themselves. Records still
    /// `running` with no live run behind them are closed as cancelled here.
    pub async fn cancel_sync(&self, channel_id: Option<&str>) -> Result<CancelReport> {
        let mut report = CancelReport::default();

        match channel_id {
            Some(channel_id) => {
                if self.is_running(channel_id) {
                    self.cancellations.request(channel_id);
                    report.flagged.push(channel_id.to_string());
                } else {
                    self.cancellations.consume(channel_id);
                    report.reconciled = self
                        .reconcile_stale(Some(channel_id), RunState::Cancelled, CANCELLED_BY_USER)
                        .await?;
                }
            }
            None => {
                let live: Vec<String> = self
                    .active_runs
                    .iter()
                    .map(|entry| entry.key().clone())
                    .collect();
                self.cancellations.request_all(&live);
                report.flagged = live;
                report.reconciled = self
                    .reconcile_stale(None, RunState::Cancelled, CANCELLED_BY_USER)
                    .await?;
            }
        }

        info!(
            flagged = report.flagged.len(),
            reconciled = report.reconciled,
            "Cancellation requested"
        );
        Ok(report)
    }

    /// Close `running` records that have no live run in this process
    pub async fn reconcile_stale(
        &self,
        channel_id: Option<&str>,
        state: RunState,
        detail: &str,
    ) -> Result<u64> {
        let mut closed = 0;

        for run in self.run_log.running_for(channel_id).await? {
            if self.is_running(&run.channel_id) {
                continue;
            }
            if self
                .run_log
                .close_if_running(run.id, state, Some(detail))
                .await?
            {
                info!(channel_id = %run.channel_id, run_id = %run.id, state = %state, "Reconciled stale run");
                closed += 1;
            }
        }

        Ok(closed)
    }

    fn claim(&self, channel_id: &str, mode: SyncMode) -> Result<RunSlot> {
        match self.active_runs.entry(channel_id.to_string()) {
            Entry::Occupied(_) => {
                debug!(channel_id = %channel_id, "Rejected run: already in flight");
                Err(SyncError::AlreadyRunning(channel_id.to_string()))
            }
            Entry::Vacant(vacant) => {
                // Flags raised while no run was active must not cancel this one.
                // Clearing under the entry lock keeps any flag raised once the
                // slot is visible.
                if self.cancellations.consume(channel_id) {
                    debug!(channel_id = %channel_id, "Discarded stale cancellation flag");
                }
                vacant.insert(ActiveRun {
                    run_id: None,
                    mode,
                    claimed_at: Utc::now(),
                });
                Ok(RunSlot {
                    channel_id: channel_id.to_string(),
                    active_runs: self.active_runs.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests;
