use super::*;
use crate::test_support::{Behavior, Harness};
use crate::types::INTERRUPTED_BY_RESTART;
use std::time::Duration;

#[tokio::test]
async fn test_run_completes() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a").with_credentials("secret")).await;

    let outcome = h.orchestrator.run("a", SyncMode::Full).await.unwrap();
    assert_eq!(outcome.state, RunState::Completed);
    assert_eq!(outcome.mode, SyncMode::Full);

    let run = h.run_log.get(outcome.run_id).await.unwrap();
    assert_eq!(run.state, RunState::Completed);
    assert!(run.completed_at.is_some());
    assert!(!h.orchestrator.is_running("a"));
    assert_eq!(h.pipeline.calls(), vec![("a".to_string(), SyncMode::Full)]);
}

#[tokio::test]
async fn test_pipeline_failure_is_recorded_and_propagated() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.pipeline.set("a", Behavior::Fail("HTTP 403"));

    let err = h
        .orchestrator
        .run("a", SyncMode::Incremental)
        .await
        .unwrap_err();
    let run_id = match err {
        SyncError::PipelineFailed {
            run_id, message, ..
        } => {
            assert_eq!(message, "HTTP 403");
            run_id
        }
        other => panic!("Expected pipeline failure, got {:?}", other),
    };

    let run = h.run_log.get(run_id).await.unwrap();
    assert_eq!(run.state, RunState::Failed);
    assert_eq!(run.error.as_deref(), Some("HTTP 403"));
    assert!(run.completed_at.is_some());
    assert!(!h.orchestrator.is_running("a"));
}

#[tokio::test]
async fn test_unknown_channel_writes_no_record() {
    let h = Harness::new().await;

    let result = h.orchestrator.run("ghost", SyncMode::Full).await;
    assert!(matches!(result, Err(SyncError::ChannelNotFound(id)) if id == "ghost"));
    assert!(h.run_log.latest(10).await.unwrap().is_empty());
    assert!(h.pipeline.calls().is_empty());
}

#[tokio::test]
async fn test_disabled_channel_runs_manually() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a").disabled()).await;

    let outcome = h.orchestrator.run("a", SyncMode::Incremental).await.unwrap();
    assert_eq!(outcome.state, RunState::Completed);
}

#[tokio::test]
async fn test_cancel_live_run() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.pipeline.set("a", Behavior::WaitForCancel);

    let orchestrator = h.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.run("a", SyncMode::Full).await });
    h.pipeline.wait_started().await;

    let report = h.orchestrator.cancel_sync(Some("a")).await.unwrap();
    assert_eq!(report.flagged, vec!["a".to_string()]);
    assert_eq!(report.reconciled, 0);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome.state, RunState::Cancelled);

    let record = h.run_log.get(outcome.run_id).await.unwrap();
    assert_eq!(record.state, RunState::Cancelled);
    assert_eq!(record.error.as_deref(), Some(CANCELLED_BY_USER));
    assert!(record.completed_at.is_some());
    assert!(!h.registry.consume("a"));
}

#[tokio::test]
async fn test_cancellation_wins_over_pipeline_error() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.pipeline.set("a", Behavior::Fail("interrupted download"));

    // Flag set after the slot is claimed, as a live cancel_sync would.
    let prepared = h.orchestrator.prepare("a", SyncMode::Full).await.unwrap();
    h.registry.request("a");

    let outcome = h.orchestrator.execute(prepared).await.unwrap();
    assert_eq!(outcome.state, RunState::Cancelled);
    assert!(h.pipeline.calls().is_empty());
}

#[tokio::test]
async fn test_second_run_rejected_while_running() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.pipeline.set("a", Behavior::WaitForCancel);

    let orchestrator = h.orchestrator.clone();
    let first = tokio::spawn(async move { orchestrator.run("a", SyncMode::Incremental).await });
    h.pipeline.wait_started().await;

    let second = h.orchestrator.run("a", SyncMode::Full).await;
    assert!(matches!(second, Err(SyncError::AlreadyRunning(_))));
    assert_eq!(h.run_log.running_for(Some("a")).await.unwrap().len(), 1);

    h.orchestrator.cancel_sync(Some("a")).await.unwrap();
    first.await.unwrap().unwrap();
    assert_eq!(h.run_log.latest(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stale_record_blocks_new_run() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.run_log.open("a", SyncMode::Full).await.unwrap();

    let result = h.orchestrator.run("a", SyncMode::Full).await;
    assert!(matches!(result, Err(SyncError::AlreadyRunning(_))));
    assert!(!h.orchestrator.is_running("a"));
}

#[tokio::test]
async fn test_cancel_without_live_run_reconciles_records() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    let stale = h.run_log.open("a", SyncMode::Full).await.unwrap();
    let other = h.run_log.open("b", SyncMode::Full).await.unwrap();

    let report = h.orchestrator.cancel_sync(Some("a")).await.unwrap();
    assert!(report.flagged.is_empty());
    assert_eq!(report.reconciled, 1);
    assert!(!h.registry.is_requested("a"));

    let stale = h.run_log.get(stale).await.unwrap();
    assert_eq!(stale.state, RunState::Cancelled);
    assert_eq!(stale.error.as_deref(), Some(CANCELLED_BY_USER));
    assert_eq!(h.run_log.get(other).await.unwrap().state, RunState::Running);

    // channel is usable again
    let outcome = h.orchestrator.run("a", SyncMode::Full).await.unwrap();
    assert_eq!(outcome.state, RunState::Completed);
}

#[tokio::test]
async fn test_cancel_all_flags_live_and_reconciles_stale() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.pipeline.set("a", Behavior::WaitForCancel);
    let stale = h.run_log.open("b", SyncMode::Incremental).await.unwrap();

    let orchestrator = h.orchestrator.clone();
    let live = tokio::spawn(async move { orchestrator.run("a", SyncMode::Full).await });
    h.pipeline.wait_started().await;

    let report = h.orchestrator.cancel_sync(None).await.unwrap();
    assert_eq!(report.flagged, vec!["a".to_string()]);
    assert_eq!(report.reconciled, 1);

    assert_eq!(live.await.unwrap().unwrap().state, RunState::Cancelled);
    assert_eq!(h.run_log.get(stale).await.unwrap().state, RunState::Cancelled);
    assert!(h.run_log.running_for(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_flag_does_not_cancel_next_run() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.registry.request("a");

    let outcome = h.orchestrator.run("a", SyncMode::Full).await.unwrap();
    assert_eq!(outcome.state, RunState::Completed);
}

#[tokio::test]
async fn test_cancel_between_claim_and_open_is_kept() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.registry.request("a");

    let channel = h.channels.get("a").await.unwrap().unwrap();
    let slot = h.orchestrator.claim("a", SyncMode::Full).unwrap();
    assert!(!h.registry.is_requested("a"));

    let report = h.orchestrator.cancel_sync(Some("a")).await.unwrap();
    assert_eq!(report.flagged, vec!["a".to_string()]);

    let prepared = h
        .orchestrator
        .open_claimed(channel, SyncMode::Full, slot)
        .await
        .unwrap();
    let outcome = h.orchestrator.execute(prepared).await.unwrap();
    assert_eq!(outcome.state, RunState::Cancelled);
    assert!(h.pipeline.calls().is_empty());
    assert_eq!(
        h.run_log.get(outcome.run_id).await.unwrap().state,
        RunState::Cancelled
    );
}

#[tokio::test]
async fn test_rejected_run_keeps_flag_of_live_run() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.pipeline.set("a", Behavior::WaitForCancel);

    let orchestrator = h.orchestrator.clone();
    let live = tokio::spawn(async move { orchestrator.run("a", SyncMode::Full).await });
    h.pipeline.wait_started().await;

    h.registry.request("a");
    let rejected = h.orchestrator.run("a", SyncMode::Incremental).await;
    assert!(matches!(rejected, Err(SyncError::AlreadyRunning(_))));

    assert_eq!(live.await.unwrap().unwrap().state, RunState::Cancelled);
}

#[tokio::test]
async fn test_reconcile_stale_on_restart() {
    let h = Harness::new().await;
    let left_over = h.run_log.open("a", SyncMode::Full).await.unwrap();

    let closed = h
        .orchestrator
        .reconcile_stale(None, RunState::Failed, INTERRUPTED_BY_RESTART)
        .await
        .unwrap();
    assert_eq!(closed, 1);

    let run = h.run_log.get(left_over).await.unwrap();
    assert_eq!(run.state, RunState::Failed);
    assert_eq!(run.error.as_deref(), Some(INTERRUPTED_BY_RESTART));
}

#[tokio::test]
async fn test_prepare_returns_ticket_before_pipeline_runs() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;

    let prepared = h.orchestrator.prepare("a", SyncMode::Incremental).await.unwrap();
    let ticket = prepared.ticket();
    assert_eq!(ticket.channel_id, "a");
    assert!(h.orchestrator.is_running("a"));
    assert_eq!(
        h.orchestrator.active_runs()[0].1.run_id,
        Some(ticket.run_id)
    );

    let running = h.run_log.get(ticket.run_id).await.unwrap();
    assert_eq!(running.state, RunState::Running);
    assert!(h.pipeline.calls().is_empty());

    let outcome = tokio::time::timeout(Duration::from_secs(5), h.orchestrator.execute(prepared))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.run_id, ticket.run_id);
    assert!(!h.orchestrator.is_running("a"));
}

#[tokio::test]
async fn test_runs_for_different_channels_overlap() {
    let h = Harness::new().await;
    h.add_channel(Channel::new("a")).await;
    h.add_channel(Channel::new("b")).await;
    h.pipeline.set("a", Behavior::WaitForCancel);

    let orchestrator = h.orchestrator.clone();
    let slow = tokio::spawn(async move { orchestrator.run("a", SyncMode::Full).await });
    h.pipeline.wait_started().await;

    let outcome = h.orchestrator.run("b", SyncMode::Full).await.unwrap();
    assert_eq!(outcome.state, RunState::Completed);
    assert!(h.orchestrator.is_running("a"));

    h.orchestrator.cancel_sync(Some("a")).await.unwrap();
    assert_eq!(slow.await.unwrap().unwrap().state, RunState::Cancelled);
}
