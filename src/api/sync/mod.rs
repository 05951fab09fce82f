//! Sync control endpoints
//!
//! POST   /api/v1/sync                        - Start a manual sync (202)
//! POST   /api/v1/sync/cancel                 - Cancel one or all runs
//! GET    /api/v1/runs                        - Latest runs
//! GET    /api/v1/runs/running                - Runs still in progress
//! PUT    /api/v1/channels/:id/schedule       - Re-read a channel's schedule
//! DELETE /api/v1/channels/:id/schedule       - Disarm a channel's schedule

pub mod handlers;
pub mod types;


pub use handlers::{
    cancel_sync, list_running, list_runs, remove_schedule, start_sync, update_schedule,
};

use axum::{
    routing::{get, post, put},
    Router,
};

/// Create sync routes
pub fn sync_routes() -> Router {
    Router::new()
        .route("/api/v1/sync", post(start_sync))
        .route("/api/v1/sync/cancel", post(cancel_sync))
        .route("/api/v1/runs", get(list_runs))
        .route("/api/v1/runs/running", get(list_running))
        .route(
            "/api/v1/channels/:id/schedule",
            put(update_schedule).delete(remove_schedule),
        )
}
