//! Runtime configuration.

use booksync_sync::SyncConfig;
use std::time::Duration;

/// Configuration for the supervisor and its per-symbol tasks.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Engine configuration applied to every symbol.
    pub sync: SyncConfig,
    /// Bound of each symbol's inbound channel.
    pub inbound_capacity: usize,
    /// Longest a publisher may take to accept one event.
    pub publish_timeout: Duration,
    /// Re-baseline synced symbols from a new snapshot at this interval.
    pub snapshot_refresh_interval: Option<Duration>,
    /// Refresh a synced symbol that received no update for this long.
    pub stale_after: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            inbound_capacity: 4096,
            publish_timeout: Duration::from_secs(5),
            snapshot_refresh_interval: None,
            stale_after: None,
        }
    }
}
