//! Supervisor owning one task per subscribed symbol.

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::health::{HealthSink, TracingHealthSink};
use crate::publisher::OrderBookPublisher;
use crate::source::{SnapshotCoordinator, SnapshotSource};
use crate::worker::{Command, SymbolWorker, WorkerTimers};
use booksync_book::OrderBookReplica;
use booksync_core::{IncrementalUpdate, SequencingPolicy, SymbolHealth, SymbolKey, SyncState};
use booksync_sync::{SyncConfig, SyncEngine, SyncStats};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Builder for configuring and creating a [`Supervisor`].
pub struct SupervisorBuilder {
    source: Arc<dyn SnapshotSource>,
    publisher: Arc<dyn OrderBookPublisher>,
    health: Arc<dyn HealthSink>,
    config: RuntimeConfig,
}

impl SupervisorBuilder {
    /// Creates a builder with the shared snapshot source and publisher.
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>, publisher: Arc<dyn OrderBookPublisher>) -> Self {
        Self {
            source,
            publisher,
            health: Arc::new(TracingHealthSink),
            config: RuntimeConfig::default(),
        }
    }

    /// Sets the health sink. Defaults to [`TracingHealthSink`].
    #[must_use]
    pub fn health_sink(mut self, health: Arc<dyn HealthSink>) -> Self {
        self.health = health;
        self
    }

    /// Replaces the whole runtime configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn sync_config(mut self, sync: SyncConfig) -> Self {
        self.config.sync = sync;
        self
    }

    /// Sets the inbound channel bound per symbol.
    #[must_use]
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.config.inbound_capacity = capacity;
        self
    }

    /// Sets the publish timeout.
    #[must_use]
    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.config.publish_timeout = timeout;
        self
    }

    /// Enables periodic snapshot refresh.
    #[must_use]
    pub fn snapshot_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.snapshot_refresh_interval = Some(interval);
        self
    }

    /// Enables stale-feed detection.
    #[must_use]
    pub fn stale_after(mut self, after: Duration) -> Self {
        self.config.stale_after = Some(after);
        self
    }

    /// Builds the supervisor.
    #[must_use]
    pub fn build(self) -> Supervisor {
        Supervisor {
            coordinator: SnapshotCoordinator::new(self.source),
            publisher: self.publisher,
            health: self.health,
            config: self.config,
            symbols: HashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

struct SymbolHandle {
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<SyncStats>,
}

/// Owns the per-symbol tasks.
///
/// Each subscribed (exchange, market, symbol) runs on its own tokio task with
/// its own inbound channel; a failing or panicking symbol never affects the
/// others.
pub struct Supervisor {
    coordinator: SnapshotCoordinator,
    publisher: Arc<dyn OrderBookPublisher>,
    health: Arc<dyn HealthSink>,
    config: RuntimeConfig,
    symbols: HashMap<SymbolKey, SymbolHandle>,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Starts synchronizing `key` with the given sequencing policy.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`RuntimeError::AlreadySubscribed`] if `key` has a running task.
    pub fn subscribe(&mut self, key: SymbolKey, policy: SequencingPolicy) -> Result<(), RuntimeError> {
        if let Some(handle) = self.symbols.get(&key) {
            if !handle.task.is_finished() {
                return Err(RuntimeError::AlreadySubscribed(key));
            }
            self.reap(&key);
        }

        let (tx, rx) = mpsc::channel(self.config.inbound_capacity.max(1));
        let cancel = self.shutdown.child_token();
        let engine = SyncEngine::new(key.clone(), policy, self.config.sync.clone());
        let timers = WorkerTimers {
            publish_timeout: self.config.publish_timeout,
            refresh_interval: self.config.snapshot_refresh_interval,
            stale_after: self.config.stale_after,
        };

        let worker = SymbolWorker::new(
            engine,
            self.coordinator.clone(),
            Arc::clone(&self.publisher),
            Arc::clone(&self.health),
            rx,
            cancel.clone(),
            timers,
        );
        let task = tokio::spawn(worker.run());

        tracing::info!("{}: subscribed ({:?})", key, policy);
        self.symbols.insert(key, SymbolHandle { tx, cancel, task });
        Ok(())
    }

    /// Stops synchronizing `key`, discarding its replica, buffer and state.
    ///
    /// Returns the final counters, or `None` if `key` was not subscribed or
    /// its task failed. Calling it twice is a no-op.
    pub async fn unsubscribe(&mut self, key: &SymbolKey) -> Option<SyncStats> {
        let handle = self.symbols.remove(key)?;
        handle.cancel.cancel();
        drop(handle.tx);

        let stats = match handle.task.await {
            Ok(stats) => Some(stats),
            Err(err) => {
                self.report_failure(key, &err);
                None
            }
        };

        self.health.remove(key);
        tracing::info!("{}: unsubscribed", key);
        stats
    }

    /// Routes an update to its symbol, waiting while the inbound channel is
    /// full.
    ///
    /// # Errors
    /// Returns [`RuntimeError::NotSubscribed`] or [`RuntimeError::ChannelClosed`].
    pub async fn submit(&self, update: IncrementalUpdate) -> Result<(), RuntimeError> {
        let key = update.key();
        let handle = self.handle(&key)?;
        handle
            .tx
            .send(Command::Update(update))
            .await
            .map_err(|_| RuntimeError::ChannelClosed(key))
    }

    /// Routes an update to its symbol without waiting.
    ///
    /// # Errors
    /// Returns [`RuntimeError::ChannelFull`] when the symbol is not keeping up,
    /// or [`RuntimeError::NotSubscribed`] / [`RuntimeError::ChannelClosed`].
    pub fn try_submit(&self, update: IncrementalUpdate) -> Result<(), RuntimeError> {
        let key = update.key();
        let handle = self.handle(&key)?;
        handle
            .tx
            .try_send(Command::Update(update))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => RuntimeError::ChannelFull(key),
                mpsc::error::TrySendError::Closed(_) => RuntimeError::ChannelClosed(key),
            })
    }

    /// Re-baselines a synced symbol from a new snapshot.
    ///
    /// # Errors
    /// Returns [`RuntimeError::NotSubscribed`] or [`RuntimeError::ChannelClosed`].
    pub async fn refresh(&self, key: &SymbolKey) -> Result<(), RuntimeError> {
        self.send(key, Command::Refresh).await
    }

    /// Clears a symbol's degradation and resyncs it.
    ///
    /// # Errors
    /// Returns [`RuntimeError::NotSubscribed`] or [`RuntimeError::ChannelClosed`].
    pub async fn restart(&self, key: &SymbolKey) -> Result<(), RuntimeError> {
        self.send(key, Command::Restart).await
    }

    /// Returns the live counters of a symbol.
    ///
    /// # Errors
    /// Returns [`RuntimeError::NotSubscribed`] or [`RuntimeError::ChannelClosed`].
    pub async fn stats(&self, key: &SymbolKey) -> Result<SyncStats, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(key, Command::Stats(reply)).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed(key.clone()))
    }

    /// Returns a copy of a symbol's replica, or `None` unless it is synced.
    ///
    /// # Errors
    /// Returns [`RuntimeError::NotSubscribed`] or [`RuntimeError::ChannelClosed`].
    pub async fn book(&self, key: &SymbolKey) -> Result<Option<OrderBookReplica>, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(key, Command::Book(reply)).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed(key.clone()))
    }

    /// Removes tasks that exited on their own, reporting panicked ones as
    /// degraded. Returns the removed keys.
    pub fn reap_finished(&mut self) -> Vec<SymbolKey> {
        let finished: Vec<SymbolKey> = self
            .symbols
            .iter()
            .filter(|(_, handle)| handle.task.is_finished())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &finished {
            self.reap(key);
        }
        finished
    }

    /// Returns true if `key` has a task.
    #[must_use]
    pub fn is_subscribed(&self, key: &SymbolKey) -> bool {
        self.symbols.contains_key(key)
    }

    /// Returns every subscribed key.
    #[must_use]
    pub fn subscribed(&self) -> Vec<SymbolKey> {
        self.symbols.keys().cloned().collect()
    }

    /// Returns the number of subscribed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns the runtime configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Cancels every task and waits for them, returning the final counters
    /// of the tasks that exited cleanly.
    pub async fn shutdown(mut self) -> HashMap<SymbolKey, SyncStats> {
        tracing::info!("shutting down {} symbols", self.symbols.len());
        self.shutdown.cancel();

        let (keys, tasks): (Vec<SymbolKey>, Vec<JoinHandle<SyncStats>>) = self
            .symbols
            .drain()
            .map(|(key, handle)| (key, handle.task))
            .unzip();

        let results = futures::future::join_all(tasks).await;

        let mut stats = HashMap::with_capacity(keys.len());
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(final_stats) => {
                    stats.insert(key, final_stats);
                }
                Err(err) => self.report_failure(&key, &err),
            }
        }
        stats
    }

    fn handle(&self, key: &SymbolKey) -> Result<&SymbolHandle, RuntimeError> {
        self.symbols
            .get(key)
            .ok_or_else(|| RuntimeError::NotSubscribed(key.clone()))
    }

    async fn send(&self, key: &SymbolKey, command: Command) -> Result<(), RuntimeError> {
        self.handle(key)?
            .tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::ChannelClosed(key.clone()))
    }

    /// Removes a finished task's handle and collects its result.
    fn reap(&mut self, key: &SymbolKey) {
        let Some(handle) = self.symbols.remove(key) else {
            return;
        };
        match handle.task.now_or_never() {
            Some(Ok(_)) => tracing::info!("{}: task exited", key),
            Some(Err(err)) => self.report_failure(key, &err),
            None => tracing::warn!("{}: reaped task had not finished", key),
        }
    }

    fn report_failure(&self, key: &SymbolKey, err: &JoinError) {
        let error = RuntimeError::Join {
            key: key.clone(),
            message: err.to_string(),
        };
        tracing::error!("{}", error);

        if err.is_panic() {
            let mut health = SymbolHealth::new(key, SyncState::Error);
            health.degraded = true;
            health.last_error = Some(error.to_string());
            self.health.report(&health);
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
