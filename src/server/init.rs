//! Server initialization
//!
//! Contains the main `run()` function that starts all server components.

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Extension, Router};
use chansync_core::{
    db, CancellationRegistry, CommandPipeline, CronDriver, RunLogStore, ScheduleManager,
    SqliteChannelStore, SyncOrchestrator,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::config::AppConfig;
use super::loader::load_config;
use crate::api;

/// Stores and orchestrator over the configured database
pub struct Components {
    pub run_log: Arc<RunLogStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

/// Open the database and wire the orchestrator
pub async fn build_components(config: &AppConfig) -> Result<Components> {
    let pool = db::connect(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;

    let channels = Arc::new(
        SqliteChannelStore::with_pool(pool.clone())
            .await
            .context("Failed to initialize channel store")?,
    );
    let run_log = Arc::new(
        RunLogStore::with_pool(pool)
            .await
            .context("Failed to initialize run log")?,
    );

    let pipeline = CommandPipeline::new(&config.pipeline.program, config.pipeline.args.clone())
        .with_poll_interval(config.pipeline.checkpoint_interval());

    let orchestrator = Arc::new(SyncOrchestrator::new(
        channels,
        run_log.clone(),
        Arc::new(CancellationRegistry::new()),
        Arc::new(pipeline),
    ));

    Ok(Components {
        run_log,
        orchestrator,
    })
}

/// Build the HTTP router around a schedule manager
pub fn build_router(manager: Arc<ScheduleManager>) -> Router {
    api::api_router()
        .merge(api::health_routes())
        .route("/", get(|| async { "Chansync" }))
        .layer(Extension(manager))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the server
pub async fn run() -> Result<()> {
    let config = load_config()?;
    info!(
        database = %config.database.path.display(),
        program = %config.pipeline.program,
        "Configuration loaded"
    );

    let components = build_components(&config).await?;
    let driver = Arc::new(
        CronDriver::new()
            .await
            .context("Failed to start cron scheduler")?,
    );
    let manager = Arc::new(
        ScheduleManager::new(components.orchestrator.clone(), driver.clone())
            .with_default_schedule(&config.scheduler.default_schedule),
    );

    if config.scheduler.enabled {
        manager
            .initialize()
            .await
            .context("Failed to initialize sync schedules")?;
    } else {
        warn!("Scheduler disabled; only manual syncs will run");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server listening on http://{}", addr);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal.cancel();
    });

    let app = build_router(manager.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("HTTP server error")?;

    manager.stop_all().await;
    if let Err(e) = driver.shutdown().await {
        warn!("Cron scheduler shutdown failed: {}", e);
    }

    info!("Chansync shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
