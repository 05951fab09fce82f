//! Timer primitives behind schedule triggers

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Future type for trigger callbacks
pub type TriggerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callback invoked every time a trigger fires
pub type TriggerCallback = Arc<dyn Fn() -> TriggerFuture + Send + Sync>;

/// Arms recurring timers
#[async_trait]
pub trait TriggerDriver: Send + Sync {
    /// Arm a timer for `schedule` that invokes `callback` on every firing
    async fn arm(
        &self,
        channel_id: &str,
        schedule: &str,
        callback: TriggerCallback,
    ) -> Result<Box<dyn TriggerHandle>>;
}

/// An armed timer
#[async_trait]
pub trait TriggerHandle: Send + Sync {
    /// Disarm the timer; it will not fire afterwards
    ///
    /// On error the timer may still be armed and the handle stays usable.
    async fn stop(&self) -> Result<()>;
}

/// Convert a 5-field cron expression to the seconds-first form
///
/// 6- and 7-field expressions are passed through unchanged.
pub fn normalize_cron(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(SyncError::InvalidSchedule {
            expression: expression.to_string(),
            reason: format!("expected 5 to 7 fields, found {}", n),
        }),
    }
}

/// Cron driver on `tokio-cron-scheduler`
pub struct CronDriver {
    scheduler: JobScheduler,
}

impl CronDriver {
    /// Create and start the underlying job scheduler
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        scheduler.start().await?;
        Ok(Self { scheduler })
    }

    /// Stop the job scheduler
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl TriggerDriver for CronDriver {
    async fn arm(
        &self,
        channel_id: &str,
        schedule: &str,
        callback: TriggerCallback,
    ) -> Result<Box<dyn TriggerHandle>> {
        let expression = normalize_cron(schedule)?;

        let job = Job::new_async(expression.as_str(), move |_job_id, _scheduler| callback())
            .map_err(|e| SyncError::InvalidSchedule {
                expression: schedule.to_string(),
                reason: e.to_string(),
            })?;

        let job_id = self.scheduler.add(job).await?;
        debug!(channel_id = %channel_id, job_id = %job_id, expression = %expression, "Cron job added");

        Ok(Box::new(CronHandle {
            scheduler: self.scheduler.clone(),
            job_id,
        }))
    }
}

struct CronHandle {
    scheduler: JobScheduler,
    job_id: Uuid,
}

#[async_trait]
impl TriggerHandle for CronHandle {
    async fn stop(&self) -> Result<()> {
        self.scheduler.remove(&self.job_id).await?;
        Ok(())
    }
}
