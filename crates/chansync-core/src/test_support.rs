//! Fakes shared by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::cancellation::CancellationRegistry;
use crate::channels::SqliteChannelStore;
use crate::db;
use crate::orchestrator::SyncOrchestrator;
use crate::pipeline::{Checkpoint, PipelineError, SyncPipeline, SyncRequest};
use crate::run_log::RunLogStore;
use crate::types::{Channel, SyncMode};

/// What the scripted pipeline does for a channel
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Succeed,
    Fail(&'static str),
    /// Polls its checkpoint until cancelled (gives up after ~10s)
    WaitForCancel,
}

/// Pipeline whose result is scripted per channel
pub(crate) struct ScriptedPipeline {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<(String, SyncMode)>>,
    started: Notify,
}

impl ScriptedPipeline {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            started: Notify::new(),
        })
    }

    pub(crate) fn set(&self, channel_id: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), behavior);
    }

    pub(crate) fn calls(&self) -> Vec<(String, SyncMode)> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until some run has entered the pipeline
    pub(crate) async fn wait_started(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.started.notified())
            .await
            .expect("pipeline never started");
    }
}

#[async_trait]
impl SyncPipeline for ScriptedPipeline {
    async fn run(
        &self,
        request: SyncRequest<'_>,
        checkpoint: &Checkpoint,
    ) -> Result<(), PipelineError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.channel_id.to_string(), request.mode));
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(request.channel_id)
            .cloned()
            .unwrap_or(Behavior::Succeed);

        self.started.notify_one();

        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail(message) => Err(PipelineError::Failed(message.to_string())),
            Behavior::WaitForCancel => {
                let mut outcome = Ok(());
                for _ in 0..2000 {
                    if let Err(e) = checkpoint.check() {
                        outcome = Err(e);
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                outcome
            }
        }
    }
}

/// Stores and orchestrator over a temporary database
pub(crate) struct Harness {
    pub channels: Arc<SqliteChannelStore>,
    pub run_log: Arc<RunLogStore>,
    pub registry: Arc<CancellationRegistry>,
    pub pipeline: Arc<ScriptedPipeline>,
    pub orchestrator: Arc<SyncOrchestrator>,
    _dir: TempDir,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = db::connect(&dir.path().join("chansync.db")).await.unwrap();
        let channels = Arc::new(SqliteChannelStore::with_pool(pool.clone()).await.unwrap());
        let run_log = Arc::new(RunLogStore::with_pool(pool).await.unwrap());
        let registry = Arc::new(CancellationRegistry::new());
        let pipeline = ScriptedPipeline::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            channels.clone(),
            run_log.clone(),
            registry.clone(),
            pipeline.clone(),
        ));

        Self {
            channels,
            run_log,
            registry,
            pipeline,
            orchestrator,
            _dir: dir,
        }
    }

    pub(crate) async fn add_channel(&self, channel: Channel) {
        self.channels.upsert(&channel).await.unwrap();
    }
}
