//! Per-symbol engine configuration.

use crate::backoff::BackoffConfig;
use std::time::Duration;

/// Configuration shared by every symbol engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Updates held while waiting for a snapshot.
    pub buffer_capacity: usize,
    /// Levels per side included in snapshot events.
    pub emit_depth: usize,
    /// Errors allowed within `error_window`; one more marks the symbol
    /// degraded.
    pub error_threshold: u32,
    /// Rolling window for `error_threshold`.
    pub error_window: Duration,
    /// Snapshot retry policy.
    pub backoff: BackoffConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1_000,
            emit_depth: 20,
            error_threshold: 5,
            error_window: Duration::from_secs(60),
            backoff: BackoffConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Sets the update buffer capacity.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Sets the number of levels per side in snapshot events.
    #[must_use]
    pub fn emit_depth(mut self, depth: usize) -> Self {
        self.emit_depth = depth;
        self
    }

    /// Sets the degradation threshold and its rolling window.
    #[must_use]
    pub fn error_threshold(mut self, threshold: u32, window: Duration) -> Self {
        self.error_threshold = threshold;
        self.error_window = window;
        self
    }

    /// Sets the snapshot retry policy.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.buffer_capacity, 1_000);
        assert_eq!(config.error_threshold, 5);
        assert_eq!(config.error_window, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_setters() {
        let config = SyncConfig::default()
            .buffer_capacity(8)
            .emit_depth(5)
            .error_threshold(2, Duration::from_secs(1));
        assert_eq!(config.buffer_capacity, 8);
        assert_eq!(config.emit_depth, 5);
        assert_eq!(config.error_threshold, 2);
        assert_eq!(config.error_window, Duration::from_secs(1));
    }
}
