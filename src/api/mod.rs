//! Web API module for Chansync
//!
//! Provides REST API endpoints for:
//! - Manual sync and cancellation
//! - Run history
//! - Schedule change notifications
//! - Health checks

pub mod health;
pub mod response;
pub mod sync;

use axum::Router;

pub use health::health_routes;
pub use sync::sync_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new().merge(sync_routes())
}
