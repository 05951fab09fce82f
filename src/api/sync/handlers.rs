use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chansync_core::{CancelReport, ScheduleManager, SyncRun};
use std::sync::Arc;
use tracing::info;

use super::super::response::ApiResult;
use super::types::{
    clamp_limit, CancelRequestBody, ListRunsQuery, RunningQuery, ScheduleView, SyncAccepted,
    SyncRequestBody,
};

/// Start a manual sync of one channel or of every enabled channel
pub async fn start_sync(
    Extension(manager): Extension<Arc<ScheduleManager>>,
    Json(request): Json<SyncRequestBody>,
) -> ApiResult<SyncAccepted> {
    match request.channel_id {
        Some(channel_id) => match manager.spawn_manual(request.mode, &channel_id).await {
            Ok(ticket) => ApiResult::accepted(SyncAccepted::Run(ticket)),
            Err(e) => e.into(),
        },
        None => {
            info!(mode = %request.mode, "Manual sync of all channels requested");
            manager.spawn_manual_all(request.mode);
            ApiResult::accepted(SyncAccepted::All {
                accepted: "all",
                mode: request.mode,
            })
        }
    }
}

/// Request cancellation of one channel's run, or of all runs
pub async fn cancel_sync(
    Extension(manager): Extension<Arc<ScheduleManager>>,
    Json(request): Json<CancelRequestBody>,
) -> ApiResult<CancelReport> {
    match manager.cancel_sync(request.channel_id.as_deref()).await {
        Ok(report) => ApiResult::ok(report),
        Err(e) => e.into(),
    }
}

/// List the most recent runs, newest first
pub async fn list_runs(
    Extension(manager): Extension<Arc<ScheduleManager>>,
    Query(query): Query<ListRunsQuery>,
) -> ApiResult<Vec<SyncRun>> {
    let limit = clamp_limit(query.limit);
    match manager.orchestrator().run_log().latest(limit).await {
        Ok(runs) => ApiResult::ok(runs),
        Err(e) => e.into(),
    }
}

/// List runs still in the `running` state
pub async fn list_running(
    Extension(manager): Extension<Arc<ScheduleManager>>,
    Query(query): Query<RunningQuery>,
) -> ApiResult<Vec<SyncRun>> {
    match manager
        .orchestrator()
        .run_log()
        .running_for(query.channel_id.as_deref())
        .await
    {
        Ok(runs) => ApiResult::ok(runs),
        Err(e) => e.into(),
    }
}

/// Re-read a channel and re-arm (or disarm) its trigger
pub async fn update_schedule(
    Extension(manager): Extension<Arc<ScheduleManager>>,
    Path(channel_id): Path<String>,
) -> ApiResult<ScheduleView> {
    match manager.update(&channel_id).await {
        Ok(armed) => {
            let schedule = manager.trigger_schedule(&channel_id).await;
            ApiResult::ok(ScheduleView {
                channel_id,
                armed,
                schedule,
            })
        }
        Err(e) => e.into(),
    }
}

/// Disarm a channel's trigger
pub async fn remove_schedule(
    Extension(manager): Extension<Arc<ScheduleManager>>,
    Path(channel_id): Path<String>,
) -> ApiResult<ScheduleView> {
    match manager.unregister(&channel_id).await {
        Ok(removed) => {
            if removed {
                info!(channel_id = %channel_id, "Schedule removed via API");
            }
            ApiResult::ok(ScheduleView {
                channel_id,
                armed: false,
                schedule: None,
            })
        }
        Err(e) => e.into(),
    }
}
