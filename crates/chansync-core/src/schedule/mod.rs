//! Recurring sync schedules
//!
//! One armed trigger per enabled channel, reconciled against the channel store
//! on startup and on explicit register/unregister/update notifications.
//!
//! ```text
//! ┌─────────────────┐   arm/stop   ┌───────────────┐
//! │ ScheduleManager │ ───────────▶ │ TriggerDriver │  (CronDriver)
//! └────────┬────────┘              └───────┬───────┘
//!          │ manual runs                   │ fires
//!          ▼                               ▼
//! ┌─────────────────────────────────────────────────┐
//! │                SyncOrchestrator                 │
//! └─────────────────────────────────────────────────┘
//! ```

mod driver;
mod manager;


pub use driver::{
    normalize_cron, CronDriver, TriggerCallback, TriggerDriver, TriggerFuture, TriggerHandle,
};
pub use manager::{run_batch, ManualOutcome, ScheduleManager, DEFAULT_SCHEDULE};
