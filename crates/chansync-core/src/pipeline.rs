//! Fetch/download pipeline contract
//!
//! The pipeline does the actual synchronization work. It never writes to the
//! run log; it only reports success or failure and polls its [`Checkpoint`]
//! between internal steps so cancellation can take effect.

mod command;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::cancellation::CancellationRegistry;
use crate::types::SyncMode;

pub use command::CommandPipeline;

/// Pipeline error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Work stopped at a checkpoint after a cancellation request
    #[error("cancelled")]
    Cancelled,
    /// Work failed
    #[error("{0}")]
    Failed(String),
}

impl PipelineError {
    /// Create a failure from any displayable error
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

/// Inputs of a single pipeline invocation
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    /// Channel to synchronize
    pub channel_id: &'a str,
    /// Opaque credentials configured on the channel
    pub credentials: Option<&'a str>,
    /// Sync mode
    pub mode: SyncMode,
}

/// The external fetch/download step
#[async_trait]
pub trait SyncPipeline: Send + Sync {
    /// Synchronize one channel
    async fn run(
        &self,
        request: SyncRequest<'_>,
        checkpoint: &Checkpoint,
    ) -> Result<(), PipelineError>;
}

/// Cancellation checkpoint handed to a running pipeline
///
/// The first successful poll consumes the channel's flag in the registry and
/// latches, so later polls on the same checkpoint keep reporting cancellation.
pub struct Checkpoint {
    channel_id: String,
    registry: Arc<CancellationRegistry>,
    observed: AtomicBool,
}

impl Checkpoint {
    /// Create a checkpoint for one run
    pub fn new(channel_id: impl Into<String>, registry: Arc<CancellationRegistry>) -> Self {
        Self {
            channel_id: channel_id.into(),
            registry,
            observed: AtomicBool::new(false),
        }
    }

    /// Channel this checkpoint belongs to
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Poll for cancellation, consuming a pending flag
    pub fn poll(&self) -> bool {
        if self.observed.load(Ordering::SeqCst) {
            return true;
        }
        if self.registry.consume(&self.channel_id) {
            self.observed.store(true, Ordering::SeqCst);
            info!(channel_id = %self.channel_id, "Cancellation observed at checkpoint");
            return true;
        }
        false
    }

    /// Poll for cancellation, returning `Err(Cancelled)` when flagged
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.poll() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Whether a previous poll observed cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.observed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_latches_cancellation() {
        let registry = Arc::new(CancellationRegistry::new());
        let checkpoint = Checkpoint::new("a", registry.clone());

        assert!(checkpoint.check().is_ok());
        assert!(!checkpoint.is_cancelled());

        registry.request("a");
        assert_eq!(checkpoint.check(), Err(PipelineError::Cancelled));
        assert!(checkpoint.is_cancelled());

        // flag consumed once, observation kept
        assert!(!registry.consume("a"));
        assert_eq!(checkpoint.check(), Err(PipelineError::Cancelled));
    }

    #[test]
    fn test_checkpoint_ignores_other_channels() {
        let registry = Arc::new(CancellationRegistry::new());
        let checkpoint = Checkpoint::new("a", registry.clone());

        registry.request("b");
        assert!(!checkpoint.poll());
        assert!(registry.is_requested("b"));
    }
}
