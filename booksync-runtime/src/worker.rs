//! Per-symbol task.

use crate::health::HealthSink;
use crate::publisher::OrderBookPublisher;
use crate::source::SnapshotCoordinator;
use booksync_book::OrderBookReplica;
use booksync_core::{IncrementalUpdate, OrderBookEvent, SymbolKey, SyncError, SyncState};
use booksync_sync::{SyncEngine, SyncOutcome, SyncStats};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

type FetchFuture = BoxFuture<'static, Result<OrderBookReplica, SyncError>>;

/// The snapshot fetch currently polled by the task.
struct PendingFetch {
    generation: u64,
    future: FetchFuture,
}

/// Input to a symbol task.
#[derive(Debug)]
pub(crate) enum Command {
    /// Incremental update in receipt order.
    Update(IncrementalUpdate),
    /// Re-baseline from a new snapshot.
    Refresh,
    /// Clear degradation and resync.
    Restart,
    /// Report the current counters.
    Stats(oneshot::Sender<SyncStats>),
    /// Report a copy of the replica while synced.
    Book(oneshot::Sender<Option<OrderBookReplica>>),
}

/// Timers and limits of one symbol task.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerTimers {
    pub publish_timeout: Duration,
    pub refresh_interval: Option<Duration>,
    pub stale_after: Option<Duration>,
}

/// Owns one [`SyncEngine`] and executes its outcomes.
///
/// All work for the symbol happens sequentially on this task; a snapshot
/// fetch runs as a future polled by the same loop so updates keep being
/// buffered while it is in flight. A new fetch request replaces the pending
/// one, dropping its future.
pub(crate) struct SymbolWorker {
    engine: SyncEngine,
    coordinator: SnapshotCoordinator,
    publisher: Arc<dyn OrderBookPublisher>,
    health: Arc<dyn HealthSink>,
    inbound: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    timers: WorkerTimers,
    fetch: Option<PendingFetch>,
}

impl SymbolWorker {
    pub(crate) fn new(
        engine: SyncEngine,
        coordinator: SnapshotCoordinator,
        publisher: Arc<dyn OrderBookPublisher>,
        health: Arc<dyn HealthSink>,
        inbound: mpsc::Receiver<Command>,
        cancel: CancellationToken,
        timers: WorkerTimers,
    ) -> Self {
        Self {
            engine,
            coordinator,
            publisher,
            health,
            inbound,
            cancel,
            timers,
            fetch: None,
        }
    }

    /// Runs until cancelled or every sender is dropped, returning the final
    /// counters.
    pub(crate) async fn run(mut self) -> SyncStats {
        let outcome = self.engine.start();
        self.execute(outcome).await;

        let mut refresh = self.timers.refresh_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut last_activity = Instant::now();

        loop {
            let stale_deadline = self.timers.stale_after.map(|after| last_activity + after);
            let synced = self.engine.state() == SyncState::Synced;

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    tracing::debug!("{}: task cancelled", self.engine.key());
                    break;
                }

                (generation, result) = poll_fetch(&mut self.fetch), if self.fetch.is_some() => {
                    self.fetch = None;
                    let outcome = match result {
                        Ok(replica) => self.engine.on_snapshot(generation, replica),
                        Err(err) => self.engine.on_snapshot_failed(generation, err),
                    };
                    self.execute(outcome).await;
                }

                command = self.inbound.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("{}: inbound channel closed", self.engine.key());
                        break;
                    };
                    if matches!(command, Command::Update(_)) {
                        last_activity = Instant::now();
                    }
                    self.handle(command).await;
                }

                () = tick(&mut refresh), if synced => {
                    let outcome = self.engine.refresh();
                    self.execute(outcome).await;
                }

                () = sleep_until(stale_deadline), if synced && stale_deadline.is_some() => {
                    tracing::warn!(
                        "{}: no update for {:?}, refreshing snapshot",
                        self.engine.key(),
                        self.timers.stale_after.unwrap_or_default()
                    );
                    last_activity = Instant::now();
                    let outcome = self.engine.refresh();
                    self.execute(outcome).await;
                }
            }
        }

        self.engine.stats()
    }

    async fn handle(&mut self, command: Command) {
        let outcome = match command {
            Command::Update(update) => self.engine.on_update(update),
            Command::Refresh => self.engine.refresh(),
            Command::Restart => self.engine.restart(),
            Command::Stats(reply) => {
                let _ = reply.send(self.engine.stats());
                return;
            }
            Command::Book(reply) => {
                let book = (self.engine.state() == SyncState::Synced)
                    .then(|| self.engine.replica().clone());
                let _ = reply.send(book);
                return;
            }
        };
        self.execute(outcome).await;
    }

    /// Reports health, starts a requested fetch and publishes events in order.
    ///
    /// A publish failure forces a resync whose outcome is executed in turn;
    /// the remaining events of the failed outcome are dropped.
    async fn execute(&mut self, outcome: SyncOutcome) {
        let mut pending = Some(outcome);

        while let Some(outcome) = pending.take() {
            for health in &outcome.health {
                self.health.report(health);
            }

            if let Some(request) = outcome.fetch {
                tracing::debug!(
                    "{}: snapshot attempt {} in {:?} (fetch {})",
                    self.engine.key(),
                    request.attempt,
                    request.delay,
                    request.generation
                );
                self.fetch = Some(PendingFetch {
                    generation: request.generation,
                    future: self
                        .coordinator
                        .fetch_after(self.engine.key().clone(), request.delay),
                });
            }

            for event in outcome.events {
                let published = publish(
                    self.publisher.as_ref(),
                    self.engine.key(),
                    self.timers.publish_timeout,
                    event,
                )
                .await;
                if let Err(err) = published {
                    pending = Some(self.engine.force_resync(err));
                    break;
                }
            }
        }
    }
}

/// Publishes one event, bounded by `timeout`.
async fn publish(
    publisher: &dyn OrderBookPublisher,
    key: &SymbolKey,
    timeout: Duration,
    event: OrderBookEvent,
) -> Result<(), SyncError> {
    match tokio::time::timeout(timeout, publisher.publish(event)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            tracing::error!("{}: publish failed: {}", key, err);
            Err(SyncError::Publish {
                message: err.to_string(),
            })
        }
        Err(_) => {
            tracing::error!("{}: publisher did not accept event within {:?}", key, timeout);
            Err(SyncError::PublishTimeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}

async fn poll_fetch(
    fetch: &mut Option<PendingFetch>,
) -> (u64, Result<OrderBookReplica, SyncError>) {
    match fetch.as_mut() {
        Some(pending) => (pending.generation, (&mut pending.future).await),
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
