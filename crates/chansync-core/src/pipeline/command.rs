//! Pipeline backed by an external program
//!
//! Runs the configured downloader once per sync and polls the checkpoint while
//! the child process is alive; a cancellation kills the child.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Checkpoint, PipelineError, SyncPipeline, SyncRequest};

/// Environment variable carrying the channel credentials to the child
pub const CREDENTIALS_ENV: &str = "CHANSYNC_CREDENTIALS";

/// Maximum stderr bytes kept in a failure message
const STDERR_TAIL_BYTES: usize = 2048;

/// Runs an external program as the sync pipeline
///
/// `{channel_id}` and `{mode}` in the argument list are substituted per run.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
    poll_interval: Duration,
}

impl CommandPipeline {
    /// Create a pipeline for `program` with argument templates
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Set how often the checkpoint is polled while the child runs
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn render_args(&self, request: &SyncRequest<'_>) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{channel_id}", request.channel_id)
                    .replace("{mode}", request.mode.as_str())
            })
            .collect()
    }
}

#[async_trait]
impl SyncPipeline for CommandPipeline {
    async fn run(
        &self,
        request: SyncRequest<'_>,
        checkpoint: &Checkpoint,
    ) -> Result<(), PipelineError> {
        checkpoint.check()?;

        let args = self.render_args(&request);
        debug!(program = %self.program, ?args, "Spawning sync command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(credentials) = request.credentials {
            cmd.env(CREDENTIALS_ENV, credentials);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| PipelineError::failed(format!("failed to spawn {}: {}", self.program, e)))?;

        let stderr = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            match stderr {
                Some(stderr) => read_tail(stderr, STDERR_TAIL_BYTES).await,
                None => Vec::new(),
            }
        });

        let mut ticker = tokio::time::interval(self.poll_interval);
        let status = loop {
            tokio::select! {
                status = child.wait() => {
                    break status.map_err(|e| PipelineError::failed(format!("wait failed: {}", e)))?;
                }
                _ = ticker.tick() => {}
            }

            if checkpoint.poll() {
                if let Err(e) = child.kill().await {
                    warn!(channel_id = %request.channel_id, "Failed to kill sync command: {}", e);
                }
                stderr_reader.abort();
                return Err(PipelineError::Cancelled);
            }
        };

        let stderr = stderr_reader.await.unwrap_or_default();
        if status.success() {
            return Ok(());
        }

        let text = String::from_utf8_lossy(&stderr);
        let text = text.trim();
        let tail = if text.len() > STDERR_TAIL_BYTES {
            let mut start = text.len() - STDERR_TAIL_BYTES;
            while !text.is_char_boundary(start) {
                start += 1;
            }
            &text[start..]
        } else {
            text
        };

        Err(PipelineError::failed(if tail.is_empty() {
            format!("{} exited with {}", self.program, status)
        } else {
            format!("{} exited with {}: {}", self.program, status, tail)
        }))
    }
}

/// Drain `reader`, keeping only its last `limit` bytes
async fn read_tail<R>(mut reader: R, limit: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(limit);
    let mut chunk = [0u8; 1024];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                tail.extend(&chunk[..n]);
                let excess = tail.len().saturating_sub(limit);
                tail.drain(..excess);
            }
            Err(e) => {
                debug!("Stopped reading sync command stderr: {}", e);
                break;
            }
        }
    }

    tail.into()
}
