//! Per-update latency of the sync engine.
//!
//! Samples are grouped by what the update caused, since a buffered update,
//! an applied delta and a resync do very different amounts of work.

use booksync_core::IncrementalUpdate;
use booksync_sync::{SyncEngine, SyncOutcome};
use std::time::{Duration, Instant};

/// What handling one update produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePath {
    /// At least one event, no fetch.
    Applied,
    /// A snapshot fetch was requested.
    Resync,
    /// No event and no fetch: buffered, stale or discarded.
    Quiet,
}

impl UpdatePath {
    /// Classifies an engine outcome.
    #[must_use]
    pub fn of(outcome: &SyncOutcome) -> Self {
        if outcome.fetch.is_some() {
            Self::Resync
        } else if outcome.events.is_empty() {
            Self::Quiet
        } else {
            Self::Applied
        }
    }
}

/// Percentiles over one group of samples.
#[derive(Debug, Clone, Copy)]
pub struct LatencySummary {
    /// Sample count.
    pub count: usize,
    /// Fastest sample.
    pub min: Duration,
    /// Median (p50).
    pub p50: Duration,
    /// 99th percentile.
    pub p99: Duration,
    /// Slowest sample.
    pub max: Duration,
}

impl LatencySummary {
    fn from_sorted(samples: &[Duration]) -> Option<Self> {
        let (first, last) = (samples.first()?, samples.last()?);
        let at = |q: f64| {
            let index = (samples.len() as f64 * q) as usize;
            samples[index.min(samples.len() - 1)]
        };
        Some(Self {
            count: samples.len(),
            min: *first,
            p50: at(0.5),
            p99: at(0.99),
            max: *last,
        })
    }
}

/// Times [`SyncEngine::on_update`] calls and groups them by [`UpdatePath`].
#[derive(Debug, Default)]
pub struct UpdateLatency {
    applied: Vec<Duration>,
    resync: Vec<Duration>,
    quiet: Vec<Duration>,
}

impl UpdateLatency {
    /// Creates a recorder expecting roughly `capacity` applied updates.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            applied: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Feeds `update` to `engine`, recording how long it took.
    pub fn feed(&mut self, engine: &mut SyncEngine, update: IncrementalUpdate) -> SyncOutcome {
        let start = Instant::now();
        let outcome = engine.on_update(update);
        self.record(UpdatePath::of(&outcome), start.elapsed());
        outcome
    }

    /// Records a sample for `path`.
    pub fn record(&mut self, path: UpdatePath, elapsed: Duration) {
        self.samples_mut(path).push(elapsed);
    }

    /// Summarizes the samples of `path`, or `None` if there are none.
    #[must_use]
    pub fn summary(&mut self, path: UpdatePath) -> Option<LatencySummary> {
        let samples = self.samples_mut(path);
        samples.sort_unstable();
        LatencySummary::from_sorted(samples)
    }

    /// Returns the total number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.applied.len() + self.resync.len() + self.quiet.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn samples_mut(&mut self, path: UpdatePath) -> &mut Vec<Duration> {
        match path {
            UpdatePath::Applied => &mut self.applied,
            UpdatePath::Resync => &mut self.resync,
            UpdatePath::Quiet => &mut self.quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SyntheticFeed;
    use booksync_book::OrderBookReplica;
    use booksync_core::{SequencingPolicy, SymbolKey};
    use booksync_sync::SyncConfig;

    #[test]
    fn test_empty_has_no_summary() {
        let mut latency = UpdateLatency::default();
        assert!(latency.is_empty());
        assert!(latency.summary(UpdatePath::Applied).is_none());
    }

    #[test]
    fn test_summary_is_ordered() {
        let mut latency = UpdateLatency::with_capacity(4);
        for micros in [40, 10, 30, 20] {
            latency.record(UpdatePath::Applied, Duration::from_micros(micros));
        }

        let summary = latency.summary(UpdatePath::Applied).unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, Duration::from_micros(10));
        assert_eq!(summary.p50, Duration::from_micros(30));
        assert_eq!(summary.max, Duration::from_micros(40));
    }

    #[test]
    fn test_feed_groups_by_path() {
        let key = SymbolKey::new("bench", "spot", "SYN");
        let mut feed = SyntheticFeed::new(key.clone(), 20);
        let mut engine = SyncEngine::new(key.clone(), SequencingPolicy::UpdateId, SyncConfig::default());
        let mut latency = UpdateLatency::default();

        // Starts synchronization and requests a snapshot.
        let snapshot = feed.snapshot();
        latency.feed(&mut engine, feed.next_update(2));
        let replica = OrderBookReplica::from_snapshot(key, &snapshot).unwrap();
        let _ = engine.on_snapshot(engine.fetch_generation(), replica);

        for _ in 0..10 {
            latency.feed(&mut engine, feed.next_update(2));
        }

        assert_eq!(latency.summary(UpdatePath::Resync).unwrap().count, 1);
        assert_eq!(latency.summary(UpdatePath::Applied).unwrap().count, 10);
        assert_eq!(latency.len(), 11);
    }
}
