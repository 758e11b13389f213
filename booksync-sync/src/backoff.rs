//! Snapshot retries within one sync cycle.
//!
//! A sync cycle starts when the engine enters `SYNCING` and ends when a
//! snapshot is installed or the cycle is abandoned. Every fetch of the cycle
//! is numbered; failures push the next fetch further out until the cycle
//! runs out of attempts.

use booksync_core::SyncError;
use std::time::Duration;

/// Configuration for snapshot retry behavior.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the second fetch of a cycle.
    pub initial_delay: Duration,
    /// Upper bound for any retry delay.
    pub max_delay: Duration,
    /// Growth factor applied per failed fetch.
    pub multiplier: f64,
    /// Fetches per sync cycle before giving up (0 = unlimited).
    pub max_attempts: usize,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl BackoffConfig {
    /// Delay before the fetch that follows the `failures`-th failure.
    ///
    /// Zero failures means the first fetch of a cycle, which is immediate.
    #[must_use]
    pub fn delay_after(&self, failures: usize) -> Duration {
        let Some(exponent) = failures.checked_sub(1) else {
            return Duration::ZERO;
        };
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// What to do after a snapshot fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Fetch again after `delay`; `attempt` numbers the new fetch.
    Retry {
        /// Fetch number within the cycle, starting at 1.
        attempt: usize,
        /// Wait before fetching.
        delay: Duration,
        /// Why the previous fetch failed.
        error: SyncError,
    },
    /// The cycle used all of its fetches.
    Exhausted {
        /// Fetches made in the cycle.
        attempts: usize,
        /// Failure of the final fetch.
        last_error: SyncError,
    },
}

/// Numbers the snapshot fetches of a sync cycle and decides on retries.
#[derive(Debug)]
pub struct SnapshotBackoff {
    config: BackoffConfig,
    failures: usize,
}

impl SnapshotBackoff {
    /// Creates the tracker at the start of a cycle.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Returns the number the next fetch of this cycle carries.
    #[must_use]
    pub fn attempt(&self) -> usize {
        self.failures + 1
    }

    /// Returns the failed fetches of this cycle.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Records that the current fetch failed with `error`.
    pub fn on_failure(&mut self, error: SyncError) -> RetryDecision {
        self.failures += 1;

        let limit = self.config.max_attempts;
        if limit > 0 && self.failures >= limit {
            return RetryDecision::Exhausted {
                attempts: self.failures,
                last_error: error,
            };
        }

        RetryDecision::Retry {
            attempt: self.attempt(),
            delay: self.config.delay_after(self.failures),
            error,
        }
    }

    /// Starts a new cycle.
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}
