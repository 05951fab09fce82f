//! Schedule manager
//!
//! Owns the channel → trigger map. Registration, unregistration and update are
//! serialized by one async mutex; trigger firing never touches the map.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::driver::{TriggerCallback, TriggerDriver, TriggerFuture, TriggerHandle};
use crate::channels::ChannelStore;
use crate::error::{Result, SyncError};
use crate::orchestrator::SyncOrchestrator;
use crate::types::{
    BatchSummary, CancelReport, RunOutcome, RunState, RunTicket, SyncMode, INTERRUPTED_BY_RESTART,
};

/// Cadence used when a channel has no schedule of its own (daily at 00:00 UTC)
pub const DEFAULT_SCHEDULE: &str = "0 0 * * *";

/// An armed recurring trigger for one channel
struct ScheduledTrigger {
    schedule: String,
    handle: Box<dyn TriggerHandle>,
}

/// Result of a manual trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ManualOutcome {
    /// One channel was run
    Single(RunOutcome),
    /// Every enabled channel was run in sequence
    Batch(BatchSummary),
}

/// Maps channels to recurring triggers and starts every run
pub struct ScheduleManager {
    channels: Arc<dyn ChannelStore>,
    orchestrator: Arc<SyncOrchestrator>,
    driver: Arc<dyn TriggerDriver>,
    triggers: Mutex<HashMap<String, ScheduledTrigger>>,
    default_schedule: String,
}

impl ScheduleManager {
    /// Create a new manager
    pub fn new(orchestrator: Arc<SyncOrchestrator>, driver: Arc<dyn TriggerDriver>) -> Self {
        Self {
            channels: orchestrator.channels().clone(),
            orchestrator,
            driver,
            triggers: Mutex::new(HashMap::new()),
            default_schedule: DEFAULT_SCHEDULE.to_string(),
        }
    }

    /// Set the cadence for channels without a schedule
    pub fn with_default_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.default_schedule = schedule.into();
        self
    }

    /// Get the orchestrator
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    /// Reconcile leftovers of a previous process and arm every enabled channel
    ///
    /// A channel that fails to register is logged and skipped. Returns the
    /// number of armed triggers.
    pub async fn initialize(&self) -> Result<usize> {
        let reconciled = self
            .orchestrator
            .reconcile_stale(None, RunState::Failed, INTERRUPTED_BY_RESTART)
            .await?;
        if reconciled > 0 {
            warn!(count = reconciled, "Closed runs interrupted by a restart");
        }

        let channels = self.channels.list_enabled().await?;
        let mut armed = 0;

        for channel in channels {
            match self.register(&channel.id).await {
                Ok(true) => armed += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(channel_id = %channel.id, "Failed to register schedule: {}", e);
                }
            }
        }

        info!("Initialized {} sync schedules", armed);
        Ok(armed)
    }

    /// Arm (or re-arm) the trigger for a channel
    ///
    /// Missing and disabled channels are skipped, returning `false`.
    pub async fn register(&self, channel_id: &str) -> Result<bool> {
        let mut triggers = self.triggers.lock().await;
        self.register_locked(&mut triggers, channel_id).await
    }

    /// Disarm a channel's trigger, returning whether one existed
    pub async fn unregister(&self, channel_id: &str) -> Result<bool> {
        let mut triggers = self.triggers.lock().await;
        Self::unregister_locked(&mut triggers, channel_id).await
    }

    /// Apply a changed schedule or enable flag
    pub async fn update(&self, channel_id: &str) -> Result<bool> {
        let mut triggers = self.triggers.lock().await;
        Self::unregister_locked(&mut triggers, channel_id).await?;
        self.register_locked(&mut triggers, channel_id).await
    }

    /// Disarm every trigger; used at shutdown
    pub async fn stop_all(&self) -> usize {
        let mut triggers = self.triggers.lock().await;
        let armed: Vec<(String, ScheduledTrigger)> = triggers.drain().collect();
        let mut stopped = 0;

        for (channel_id, trigger) in armed {
            match trigger.handle.stop().await {
                Ok(()) => stopped += 1,
                Err(e) => {
                    warn!(channel_id = %channel_id, "Failed to stop trigger: {}", e);
                    triggers.insert(channel_id, trigger);
                }
            }
        }

        info!("Stopped {} sync schedules", stopped);
        stopped
    }

    /// Schedule a channel's trigger was built from, if armed
    pub async fn trigger_schedule(&self, channel_id: &str) -> Option<String> {
        self.triggers
            .lock()
            .await
            .get(channel_id)
            .map(|t| t.schedule.clone())
    }

    /// Number of armed triggers
    pub async fn trigger_count(&self) -> usize {
        self.triggers.lock().await.len()
    }

    /// Run one channel now, or every enabled channel when `channel_id` is `None`
    pub async fn trigger_manual(
        &self,
        mode: SyncMode,
        channel_id: Option<&str>,
    ) -> Result<ManualOutcome> {
        match channel_id {
            Some(channel_id) => self.run_once(mode, channel_id).await.map(ManualOutcome::Single),
            None => self.run_all(mode).await.map(ManualOutcome::Batch),
        }
    }

    /// Run one channel once, regardless of its enable flag
    pub async fn run_once(&self, mode: SyncMode, channel_id: &str) -> Result<RunOutcome> {
        info!(channel_id = %channel_id, mode = %mode, "Manual sync requested");
        self.orchestrator.run(channel_id, mode).await
    }

    /// Run every enabled channel sequentially
    pub async fn run_all(&self, mode: SyncMode) -> Result<BatchSummary> {
        run_batch(self.channels.as_ref(), &self.orchestrator, mode).await
    }

    /// Start a run in the background and return its ticket
    ///
    /// The channel is validated and its record opened before this returns.
    pub async fn spawn_manual(&self, mode: SyncMode, channel_id: &str) -> Result<RunTicket> {
        let prepared = self.orchestrator.prepare(channel_id, mode).await?;
        let ticket = prepared.ticket();

        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.execute(prepared).await {
                error!("Background sync failed: {}", e);
            }
        });

        Ok(ticket)
    }

    /// Start a "sync all" batch in the background
    pub fn spawn_manual_all(&self, mode: SyncMode) {
        let channels = self.channels.clone();
        let orchestrator = self.orchestrator.clone();

        tokio::spawn(async move {
            match run_batch(channels.as_ref(), &orchestrator, mode).await {
                Ok(summary) => debug!(?summary, "Background batch finished"),
                Err(e) => error!("Background batch failed: {}", e),
            }
        });
    }

    /// Request cancellation; see [`SyncOrchestrator::cancel_sync`]
    pub async fn cancel_sync(&self, channel_id: Option<&str>) -> Result<CancelReport> {
        self.orchestrator.cancel_sync(channel_id).await
    }

    async fn register_locked(
        &self,
        triggers: &mut HashMap<String, ScheduledTrigger>,
        channel_id: &str,
    ) -> Result<bool> {
        let channel = match self.channels.get(channel_id).await? {
            Some(channel) if channel.enabled => channel,
            Some(_) => {
                debug!(channel_id = %channel_id, "Sync disabled, not scheduling");
                Self::unregister_locked(triggers, channel_id).await?;
                return Ok(false);
            }
            None => {
                debug!(channel_id = %channel_id, "Channel not found, not scheduling");
                Self::unregister_locked(triggers, channel_id).await?;
                return Ok(false);
            }
        };

        Self::unregister_locked(triggers, channel_id).await?;

        let schedule = channel
            .configured_schedule()
            .unwrap_or(&self.default_schedule)
            .to_string();
        let callback = self.fire_callback(channel_id);
        let handle = self.driver.arm(channel_id, &schedule, callback).await?;

        info!(channel_id = %channel_id, schedule = %schedule, "Sync schedule armed");
        triggers.insert(channel_id.to_string(), ScheduledTrigger { schedule, handle });
        Ok(true)
    }

    async fn unregister_locked(
        triggers: &mut HashMap<String, ScheduledTrigger>,
        channel_id: &str,
    ) -> Result<bool> {
        let Some(trigger) = triggers.get(channel_id) else {
            return Ok(false);
        };

        // Tracked until the timer is known to be disarmed.
        trigger.handle.stop().await?;
        if let Some(trigger) = triggers.remove(channel_id) {
            info!(channel_id = %channel_id, schedule = %trigger.schedule, "Sync schedule stopped");
        }
        Ok(true)
    }

    fn fire_callback(&self, channel_id: &str) -> TriggerCallback {
        let orchestrator = self.orchestrator.clone();
        let channel_id = channel_id.to_string();

        Arc::new(move || -> TriggerFuture {
            let orchestrator = orchestrator.clone();
            let channel_id = channel_id.clone();
            Box::pin(async move {
                match orchestrator.run(&channel_id, SyncMode::Incremental).await {
                    Ok(outcome) => {
                        debug!(channel_id = %channel_id, state = %outcome.state, "Scheduled sync finished");
                    }
                    Err(SyncError::AlreadyRunning(_)) => {
                        warn!(channel_id = %channel_id, "Scheduled sync skipped: already running");
                    }
                    Err(e) => {
                        error!(channel_id = %channel_id, "Scheduled sync failed: {}", e);
                    }
                }
            })
        })
    }
}

/// Run every enabled channel one after another
///
/// Failures are counted, never propagated; only a failure to list channels
/// aborts the batch.
pub async fn run_batch(
    channels: &dyn ChannelStore,
    orchestrator: &SyncOrchestrator,
    mode: SyncMode,
) -> Result<BatchSummary> {
    let enabled = channels.list_enabled().await?;
    let mut summary = BatchSummary {
        attempted: enabled.len(),
        ..BatchSummary::default()
    };

    info!(count = summary.attempted, mode = %mode, "Sync of all channels started");

    for channel in enabled {
        match orchestrator.run(&channel.id, mode).await {
            Ok(outcome) if outcome.state == RunState::Cancelled => summary.cancelled += 1,
            Ok(_) => summary.completed += 1,
            Err(SyncError::AlreadyRunning(_)) => {
                warn!(channel_id = %channel.id, "Skipped: already running");
                summary.rejected += 1;
            }
            Err(e) => {
                error!(channel_id = %channel.id, "Sync failed: {}", e);
                summary.failed += 1;
            }
        }
    }

    info!(
        attempted = summary.attempted,
        completed = summary.completed,
        failed = summary.failed,
        cancelled = summary.cancelled,
        rejected = summary.rejected,
        "Sync of all channels finished"
    );
    Ok(summary)
}
