//! Cooperative cancellation flags
//!
//! A process-wide set of channel IDs flagged for cancellation. Running work
//! polls it at checkpoints; [`CancellationRegistry::consume`] checks and clears
//! in one step so a flag is honored by exactly one observer.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Channel ID → time the cancellation was requested
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    flags: DashMap<String, DateTime<Utc>>,
}

impl CancellationRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag one channel
    ///
    /// Repeated requests keep the earliest timestamp.
    pub fn request(&self, channel_id: &str) {
        self.flags
            .entry(channel_id.to_string())
            .or_insert_with(Utc::now);
        debug!(channel_id = %channel_id, "Cancellation requested");
    }

    /// Flag every channel in `channel_ids`, returning how many were flagged
    pub fn request_all<I, S>(&self, channel_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for channel_id in channel_ids {
            self.request(channel_id.as_ref());
            count += 1;
        }
        count
    }

    /// Check and clear the flag for a channel
    pub fn consume(&self, channel_id: &str) -> bool {
        self.flags.remove(channel_id).is_some()
    }

    /// Whether a channel is flagged, without clearing it
    #[must_use]
    pub fn is_requested(&self, channel_id: &str) -> bool {
        self.flags.contains_key(channel_id)
    }

    /// When the pending cancellation for a channel was requested
    #[must_use]
    pub fn requested_at(&self, channel_id: &str) -> Option<DateTime<Utc>> {
        self.flags.get(channel_id).map(|entry| *entry.value())
    }

    /// Number of pending flags
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Whether no flags are pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_consume_clears_flag() {
        let registry = CancellationRegistry::new();
        registry.request("a");

        assert!(registry.is_requested("a"));
        assert!(registry.consume("a"));
        assert!(!registry.consume("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_consume_unflagged_channel() {
        let registry = CancellationRegistry::new();
        registry.request("a");

        assert!(!registry.consume("b"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_repeated_request_keeps_first_timestamp() {
        let registry = CancellationRegistry::new();
        registry.request("a");
        let first = registry.requested_at("a").unwrap();
        registry.request("a");

        assert_eq!(registry.requested_at("a"), Some(first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_request_all() {
        let registry = CancellationRegistry::new();
        let flagged = registry.request_all(["a", "b", "c"]);

        assert_eq!(flagged, 3);
        assert!(registry.consume("b"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumers_honor_flag_once() {
        let registry = Arc::new(CancellationRegistry::new());
        let honored = Arc::new(AtomicUsize::new(0));

        for round in 0..50 {
            let channel = format!("channel-{}", round);
            registry.request(&channel);

            let mut handles = Vec::new();
            for _ in 0..8 {
                let registry = registry.clone();
                let honored = honored.clone();
                let channel = channel.clone();
                handles.push(tokio::spawn(async move {
                    if registry.consume(&channel) {
                        honored.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
        }

        assert_eq!(honored.load(Ordering::SeqCst), 50);
        assert!(registry.is_empty());
    }
}
