//! Per-symbol synchronization engine.
//!
//! The engine is synchronous: every entry point returns a [`SyncOutcome`]
//! describing the events to publish, the health records to report and
//! whether a snapshot fetch must be started. The async runtime executes the
//! outcome and feeds fetch results back through [`SyncEngine::on_snapshot`]
//! and [`SyncEngine::on_snapshot_failed`], tagged with the generation of the
//! [`FetchRequest`] they answer. Every request supersedes the previous one,
//! so a result for an older generation is ignored.

use crate::applier::DeltaApplier;
use crate::backoff::{RetryDecision, SnapshotBackoff};
use crate::buffer::UpdateBuffer;
use crate::config::SyncConfig;
use crate::state::{ErrorDisposition, SyncStateMachine};
use crate::validator::ConsistencyValidator;
use booksync_book::OrderBookReplica;
use booksync_core::{
    IncrementalUpdate, OrderBookEvent, SequencingPolicy, Severity, SymbolHealth, SymbolKey,
    SyncError, SyncState,
};
use std::time::{Duration, Instant};

/// A snapshot fetch the runtime must start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Delay before fetching; zero for the first attempt of a cycle.
    pub delay: Duration,
    /// Attempt number within the current sync cycle, starting at 1.
    pub attempt: usize,
    /// Identifies this request; the result must be reported with it.
    pub generation: u64,
}

/// Work produced by one engine entry point.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Events to publish, in order.
    pub events: Vec<OrderBookEvent>,
    /// Health records to report, in order.
    pub health: Vec<SymbolHealth>,
    /// Snapshot fetch to start, if any.
    pub fetch: Option<FetchRequest>,
}

impl SyncOutcome {
    /// Returns true if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.health.is_empty() && self.fetch.is_none()
    }
}

/// Counters kept per symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Updates handed to the engine.
    pub updates_received: u64,
    /// Updates applied to the replica.
    pub applied: u64,
    /// Updates buffered while waiting for a snapshot.
    pub buffered: u64,
    /// Updates already covered by the replica or the snapshot baseline.
    pub dropped_stale: u64,
    /// Updates thrown away by a resync, overflow or a degraded symbol.
    pub discarded: u64,
    /// Events handed to the publisher.
    pub events_emitted: u64,
    /// Error-driven resyncs.
    pub resyncs: u64,
    /// Refresh resyncs (periodic or stale feed).
    pub refreshes: u64,
    /// Snapshot fetches requested.
    pub snapshot_requests: u64,
    /// Snapshot fetches that failed or were rejected.
    pub snapshot_failures: u64,
}

/// Orchestrates buffering, snapshot install, delta application and resync
/// for one (exchange, market, symbol).
#[derive(Debug)]
pub struct SyncEngine {
    key: SymbolKey,
    config: SyncConfig,
    machine: SyncStateMachine,
    buffer: UpdateBuffer,
    applier: DeltaApplier,
    validator: ConsistencyValidator,
    backoff: SnapshotBackoff,
    replica: OrderBookReplica,
    last_emitted_id: Option<u64>,
    /// Set by an error: the next snapshot must move past `last_emitted_id`.
    rebaseline: bool,
    fetch_generation: u64,
    fetch_in_flight: bool,
    stats: SyncStats,
}

impl SyncEngine {
    /// Creates an engine in `UNSYNCED` with an empty replica.
    #[must_use]
    pub fn new(key: SymbolKey, policy: SequencingPolicy, config: SyncConfig) -> Self {
        Self {
            replica: OrderBookReplica::new(key.clone()),
            key,
            machine: SyncStateMachine::new(config.error_threshold, config.error_window),
            buffer: UpdateBuffer::new(config.buffer_capacity),
            applier: DeltaApplier::new(policy),
            validator: ConsistencyValidator::new(policy),
            backoff: SnapshotBackoff::new(config.backoff.clone()),
            config,
            last_emitted_id: None,
            rebaseline: false,
            fetch_generation: 0,
            fetch_in_flight: false,
            stats: SyncStats::default(),
        }
    }

    /// Returns the symbol this engine synchronizes.
    #[must_use]
    pub fn key(&self) -> &SymbolKey {
        &self.key
    }

    /// Returns the sequencing policy.
    #[must_use]
    pub fn policy(&self) -> SequencingPolicy {
        self.applier.policy()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the current sync state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.machine.state()
    }

    /// Returns true if the symbol is parked in `ERROR` until restarted.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.machine.is_degraded()
    }

    /// Returns the replica. Only meaningful while `SYNCED`.
    #[must_use]
    pub fn replica(&self) -> &OrderBookReplica {
        &self.replica
    }

    /// Returns the current health record.
    #[must_use]
    pub fn health(&self) -> SymbolHealth {
        self.machine.health(&self.key)
    }

    /// Returns the per-symbol counters.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Returns the update id of the last event handed to the publisher.
    #[must_use]
    pub fn last_emitted_id(&self) -> Option<u64> {
        self.last_emitted_id
    }

    /// Returns the number of buffered updates.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true while a requested snapshot has not been reported back.
    #[must_use]
    pub fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    /// Returns the generation of the most recent [`FetchRequest`].
    #[must_use]
    pub fn fetch_generation(&self) -> u64 {
        self.fetch_generation
    }

    /// Starts synchronization: `UNSYNCED -> SYNCING` and a snapshot request.
    ///
    /// Does nothing in any other state.
    pub fn start(&mut self) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        self.begin(&mut outcome);
        self.finish(outcome)
    }

    /// Handles one incremental update.
    ///
    /// Buffers while `UNSYNCED` (starting synchronization) or `SYNCING`,
    /// applies and validates while `SYNCED`, discards while `ERROR`.
    pub fn on_update(&mut self, update: IncrementalUpdate) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        self.stats.updates_received += 1;

        if !update.belongs_to(&self.key) {
            tracing::warn!(
                "{}: dropping update routed from {}",
                self.key,
                update.key()
            );
            self.stats.discarded += 1;
            return outcome;
        }

        match self.machine.state() {
            SyncState::Unsynced => {
                self.begin(&mut outcome);
                self.buffer_update(&mut outcome, update);
            }
            SyncState::Syncing => self.buffer_update(&mut outcome, update),
            SyncState::Synced => match self.apply_one(update) {
                Ok(Some(event)) => {
                    self.machine.record_success();
                    outcome.events.push(event);
                }
                Ok(None) => {}
                Err((err, rejected)) => {
                    self.fail(&mut outcome, err, rejected.into_iter().collect());
                }
            },
            SyncState::Error => {
                tracing::debug!(
                    "{}: discarding update {} while in ERROR",
                    self.key,
                    update.last_update_id
                );
                self.stats.discarded += 1;
            }
        }

        self.finish(outcome)
    }

    /// Installs a freshly fetched replica and replays buffered updates.
    ///
    /// `generation` is the one of the [`FetchRequest`] being answered; results
    /// of superseded requests are ignored. A snapshot that fails validation or
    /// does not advance past what was already published is treated as a
    /// failed fetch and retried. A refresh snapshot at exactly the last
    /// emitted id is installed without announcing it again.
    pub fn on_snapshot(&mut self, generation: u64, replica: OrderBookReplica) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        if !self.accept_fetch_result(generation) {
            tracing::debug!(
                "{}: ignoring snapshot {} from superseded fetch {}",
                self.key,
                replica.last_update_id(),
                generation
            );
            return self.finish(outcome);
        }

        if self.machine.state() != SyncState::Syncing {
            tracing::debug!(
                "{}: ignoring snapshot {} in state {}",
                self.key,
                replica.last_update_id(),
                self.machine.state()
            );
            return self.finish(outcome);
        }

        let baseline = replica.last_update_id();
        if let Some(last_emitted) = self.last_emitted_id {
            if baseline < last_emitted || (baseline == last_emitted && self.rebaseline) {
                let err = SyncError::StaleSnapshot {
                    snapshot_id: baseline,
                    last_emitted,
                };
                self.snapshot_failed(&mut outcome, err);
                return self.finish(outcome);
            }
        }

        if let Err(err) = self.validator.validate(&replica) {
            self.snapshot_failed(&mut outcome, err);
            return self.finish(outcome);
        }

        self.replica = replica;
        self.backoff.reset();

        if self.last_emitted_id.is_none_or(|last| baseline > last) {
            let (bids, asks) = self.replica.top_n(self.config.emit_depth);
            outcome
                .events
                .push(OrderBookEvent::snapshot(&self.key, baseline, bids, asks));
            self.rebaseline = false;
        } else {
            tracing::debug!(
                "{}: snapshot {} matches the last emitted update, not announced",
                self.key,
                baseline
            );
        }

        let drained = self.buffer.drain_applicable(baseline);
        self.stats.dropped_stale += drained.discarded as u64;
        tracing::info!(
            "{}: installed snapshot {}, replaying {} buffered updates ({} already covered)",
            self.key,
            baseline,
            drained.applicable.len(),
            drained.discarded
        );

        let mut pending = drained.applicable.into_iter().map(|entry| entry.update);
        while let Some(update) = pending.next() {
            match self.apply_one(update) {
                Ok(Some(event)) => {
                    self.machine.record_success();
                    outcome.events.push(event);
                }
                Ok(None) => {}
                Err((err, rejected)) => {
                    let rebuffer = rejected.into_iter().chain(pending).collect();
                    self.fail(&mut outcome, err, rebuffer);
                    return self.finish(outcome);
                }
            }
        }

        if self.transition(SyncState::Synced) {
            outcome.health.push(self.health());
        }

        self.finish(outcome)
    }

    /// Handles a failed snapshot fetch of the given generation.
    ///
    /// Retries with backoff; once the retry limit is reached the failure
    /// counts as an error transition and a new cycle starts.
    pub fn on_snapshot_failed(&mut self, generation: u64, error: SyncError) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        if !self.accept_fetch_result(generation) {
            tracing::debug!(
                "{}: ignoring failure of superseded fetch {}: {}",
                self.key,
                generation,
                error
            );
        } else if self.machine.state() == SyncState::Syncing {
            self.snapshot_failed(&mut outcome, error);
        } else {
            tracing::debug!(
                "{}: ignoring snapshot failure in state {}: {}",
                self.key,
                self.machine.state(),
                error
            );
        }

        self.finish(outcome)
    }

    /// Re-baselines a synced symbol from a new snapshot without counting an
    /// error. Updates are buffered until the snapshot is installed.
    pub fn refresh(&mut self) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        if self.machine.state() == SyncState::Synced && self.transition(SyncState::Syncing) {
            tracing::info!(
                "{}: refreshing snapshot at update {}",
                self.key,
                self.replica.last_update_id()
            );
            self.stats.refreshes += 1;
            self.backoff.reset();
            outcome.health.push(self.health());
            self.request_fetch(&mut outcome, Duration::ZERO);
        }

        self.finish(outcome)
    }

    /// Discards the replica and resyncs because of an error detected outside
    /// the engine, such as a publisher timeout.
    pub fn force_resync(&mut self, error: SyncError) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        match self.machine.state() {
            SyncState::Syncing | SyncState::Synced => self.fail(&mut outcome, error, Vec::new()),
            state => tracing::debug!(
                "{}: ignoring forced resync in state {}: {}",
                self.key,
                state,
                error
            ),
        }

        self.finish(outcome)
    }

    /// Clears degradation and error history and starts over.
    pub fn restart(&mut self) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        tracing::info!("{}: restarting synchronization", self.key);
        self.stats.discarded += self.buffer.len() as u64;
        self.buffer.clear();
        self.replica = OrderBookReplica::new(self.key.clone());
        self.backoff.reset();
        self.abandon_fetch();
        self.rebaseline = true;
        self.machine.reset();
        outcome.health.push(self.health());

        self.begin(&mut outcome);
        self.finish(outcome)
    }

    fn begin(&mut self, outcome: &mut SyncOutcome) {
        if self.machine.state() == SyncState::Unsynced && self.transition(SyncState::Syncing) {
            tracing::info!("{}: synchronization started", self.key);
            outcome.health.push(self.health());
            self.request_fetch(outcome, Duration::ZERO);
        }
    }

    fn buffer_update(&mut self, outcome: &mut SyncOutcome, update: IncrementalUpdate) {
        tracing::debug!(
            "{}: buffering update {}..={}",
            self.key,
            update.first_update_id,
            update.last_update_id
        );
        self.stats.buffered += 1;

        if self.buffer.push(update).is_some() {
            self.stats.discarded += 1;
            let err = SyncError::BufferOverflow {
                capacity: self.buffer.capacity(),
            };
            self.fail(outcome, err, Vec::new());
        }
    }

    /// Applies and validates one update.
    ///
    /// Returns `Ok(None)` for stale updates. On failure the update is handed
    /// back when it should be replayed after the resync.
    fn apply_one(
        &mut self,
        update: IncrementalUpdate,
    ) -> Result<Option<OrderBookEvent>, (SyncError, Option<IncrementalUpdate>)> {
        match self.applier.apply(&mut self.replica, &update) {
            Ok(()) => {}
            Err(SyncError::StaleUpdate {
                update_id,
                replica_id,
            }) => {
                tracing::debug!(
                    "{}: dropping stale update {} (replica at {})",
                    self.key,
                    update_id,
                    replica_id
                );
                self.stats.dropped_stale += 1;
                return Ok(None);
            }
            Err(err @ SyncError::SequenceGap { .. }) => return Err((err, Some(update))),
            Err(err) => return Err((err, None)),
        }

        self.validator.validate(&self.replica).map_err(|err| (err, None))?;

        self.stats.applied += 1;
        Ok(Some(OrderBookEvent::delta(
            &self.key,
            self.replica.last_update_id(),
            update.bid_changes,
            update.ask_changes,
        )))
    }

    /// ERROR transition: flush queued events, drop the replica and buffer,
    /// then either resync or park the symbol as degraded.
    fn fail(&mut self, outcome: &mut SyncOutcome, error: SyncError, rebuffer: Vec<IncrementalUpdate>) {
        outcome.events.clear();
        outcome.fetch = None;
        self.log_error(&error);

        self.stats.discarded += self.buffer.len() as u64;
        self.buffer.clear();
        self.replica = OrderBookReplica::new(self.key.clone());
        self.backoff.reset();
        self.abandon_fetch();
        self.rebaseline = true;

        let disposition = self.machine.record_error(error, Instant::now());
        outcome.health.push(self.health());

        if disposition == ErrorDisposition::Degraded {
            self.stats.discarded += rebuffer.len() as u64;
            tracing::error!(
                "{}: degraded after more than {} errors, updates discarded until restart",
                self.key,
                self.config.error_threshold
            );
            return;
        }

        if self.transition(SyncState::Syncing) {
            self.stats.resyncs += 1;
            outcome.health.push(self.health());
            for update in rebuffer {
                if self.buffer.push(update).is_some() {
                    self.stats.discarded += 1;
                }
            }
            self.request_fetch(outcome, Duration::ZERO);
        }
    }

    fn snapshot_failed(&mut self, outcome: &mut SyncOutcome, error: SyncError) {
        self.stats.snapshot_failures += 1;

        match self.backoff.on_failure(error) {
            RetryDecision::Retry {
                attempt,
                delay,
                error,
            } => {
                tracing::warn!(
                    "{}: snapshot fetch failed, attempt {} in {:?}: {}",
                    self.key,
                    attempt,
                    delay,
                    error
                );
                self.machine.note_error(error);
                outcome.health.push(self.health());
                self.request_fetch(outcome, delay);
            }
            RetryDecision::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::warn!(
                    "{}: snapshot attempts exhausted after {} tries",
                    self.key,
                    attempts
                );
                self.fail(outcome, last_error, Vec::new());
            }
        }
    }

    /// Issues a new fetch, superseding any that is still in flight.
    fn request_fetch(&mut self, outcome: &mut SyncOutcome, delay: Duration) {
        self.fetch_generation += 1;
        self.fetch_in_flight = true;
        outcome.fetch = Some(FetchRequest {
            delay,
            attempt: self.backoff.attempt(),
            generation: self.fetch_generation,
        });
    }

    /// Makes the result of any in-flight fetch stale.
    fn abandon_fetch(&mut self) {
        if self.fetch_in_flight {
            tracing::debug!(
                "{}: abandoning snapshot fetch {}",
                self.key,
                self.fetch_generation
            );
        }
        self.fetch_generation += 1;
        self.fetch_in_flight = false;
    }

    fn accept_fetch_result(&mut self, generation: u64) -> bool {
        if !self.fetch_in_flight || generation != self.fetch_generation {
            return false;
        }
        self.fetch_in_flight = false;
        true
    }

    fn transition(&mut self, to: SyncState) -> bool {
        match self.machine.transition(to) {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("{}: {}", self.key, err);
                false
            }
        }
    }

    fn log_error(&self, error: &SyncError) {
        match error.severity() {
            Severity::Critical => tracing::error!("{}: {}", self.key, error),
            Severity::Warning => tracing::warn!("{}: {}", self.key, error),
            Severity::Debug => tracing::debug!("{}: {}", self.key, error),
        }
    }

    /// Commits the emitted ids and the fetch of an outcome that is about to
    /// be returned.
    fn finish(&mut self, outcome: SyncOutcome) -> SyncOutcome {
        if let Some(last) = outcome.events.last() {
            self.last_emitted_id = Some(last.last_update_id);
        }
        if outcome.fetch.is_some() {
            self.stats.snapshot_requests += 1;
        }
        self.stats.events_emitted += outcome.events.len() as u64;
        outcome
    }
}
