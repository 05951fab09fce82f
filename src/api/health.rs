//! Health check endpoints with component-level diagnostics.
//!
//! Provides:
//! - `/health`: simple "healthy" + version (for load balancers)
//! - `/health/detailed`: run log reachability, armed triggers and live runs

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use chansync_core::ScheduleManager;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: ComponentHealth,
    pub armed_triggers: usize,
    pub active_runs: usize,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn detailed_health_check(
    Extension(manager): Extension<Arc<ScheduleManager>>,
) -> Json<DetailedHealthResponse> {
    let started = Instant::now();
    let database = match manager.orchestrator().run_log().latest(1).await {
        Ok(_) => ComponentHealth {
            status: "healthy",
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: "unhealthy",
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    Json(DetailedHealthResponse {
        status: database.status,
        version: env!("CARGO_PKG_VERSION"),
        database,
        armed_triggers: manager.trigger_count().await,
        active_runs: manager.orchestrator().active_runs().len(),
    })
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
}
