//! Snapshot fetching.

use crate::error::SourceError;
use async_trait::async_trait;
use booksync_book::OrderBookReplica;
use booksync_core::{SnapshotData, SymbolKey, SyncError};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// REST collaborator returning full order book snapshots.
///
/// Implementations are shared by every symbol task and must be safe to call
/// concurrently.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches the current snapshot for `key`.
    ///
    /// # Errors
    /// Returns [`SourceError`] on transport failure or an unusable response.
    async fn fetch_snapshot(&self, key: &SymbolKey) -> Result<SnapshotData, SourceError>;
}

/// Fetches snapshots and turns them into fresh replica baselines.
///
/// Has no side effects on buffers or existing replicas; retry policy belongs
/// to the engine.
#[derive(Clone)]
pub struct SnapshotCoordinator {
    source: Arc<dyn SnapshotSource>,
}

impl SnapshotCoordinator {
    /// Creates a coordinator over a shared snapshot source.
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self { source }
    }

    /// Fetches a snapshot for `key` and builds a replica from it.
    ///
    /// # Errors
    /// Returns [`SyncError::SnapshotFetch`] if the source fails or the
    /// snapshot contains a negative quantity.
    pub async fn fetch_and_install(&self, key: &SymbolKey) -> Result<OrderBookReplica, SyncError> {
        let snapshot = self
            .source
            .fetch_snapshot(key)
            .await
            .map_err(SyncError::snapshot_fetch)?;

        tracing::debug!(
            "{}: fetched snapshot {} ({} bids, {} asks)",
            key,
            snapshot.last_update_id,
            snapshot.bids.len(),
            snapshot.asks.len()
        );

        OrderBookReplica::from_snapshot(key.clone(), &snapshot).map_err(SyncError::snapshot_fetch)
    }

    /// Returns a future that waits `delay` and then fetches.
    pub(crate) fn fetch_after(
        &self,
        key: SymbolKey,
        delay: Duration,
    ) -> BoxFuture<'static, Result<OrderBookReplica, SyncError>> {
        let coordinator = self.clone();
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            coordinator.fetch_and_install(&key).await
        }
        .boxed()
    }
}

impl std::fmt::Debug for SnapshotCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCoordinator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booksync_core::PriceLevel;
    use rust_decimal_macros::dec;

    struct FixedSource(Result<SnapshotData, String>);

    #[async_trait]
    impl SnapshotSource for FixedSource {
        async fn fetch_snapshot(&self, _key: &SymbolKey) -> Result<SnapshotData, SourceError> {
            self.0.clone().map_err(|message| SourceError::Transport { message })
        }
    }

    fn key() -> SymbolKey {
        SymbolKey::new("binance", "spot", "BTCUSDT")
    }

    #[tokio::test]
    async fn test_fetch_and_install_builds_replica() {
        let snapshot = SnapshotData::new(
            42,
            vec![
                PriceLevel::new(dec!(100), dec!(1)),
                PriceLevel::new(dec!(99), dec!(0)),
            ],
            vec![PriceLevel::new(dec!(101), dec!(2))],
        );
        let coordinator = SnapshotCoordinator::new(Arc::new(FixedSource(Ok(snapshot))));

        let replica = coordinator.fetch_and_install(&key()).await.unwrap();
        assert_eq!(replica.last_update_id(), 42);
        assert_eq!(replica.bids().len(), 1);
        assert_eq!(replica.key(), &key());
    }

    #[tokio::test]
    async fn test_transport_error_wrapped() {
        let coordinator = SnapshotCoordinator::new(Arc::new(FixedSource(Err("503".into()))));

        let err = coordinator.fetch_and_install(&key()).await.unwrap_err();
        assert_eq!(
            err,
            SyncError::SnapshotFetch {
                message: "transport error: 503".into()
            }
        );
    }

    /// Lists only BTCUSDT and cannot decode its response.
    struct BrokenListing;

    #[async_trait]
    impl SnapshotSource for BrokenListing {
        async fn fetch_snapshot(&self, key: &SymbolKey) -> Result<SnapshotData, SourceError> {
            if key.symbol != "BTCUSDT" {
                return Err(SourceError::UnknownSymbol(key.clone()));
            }
            Err(SourceError::Malformed {
                message: "missing lastUpdateId".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_source_rejections_wrapped() {
        let coordinator = SnapshotCoordinator::new(Arc::new(BrokenListing));

        let unknown = SymbolKey::new("binance", "spot", "DOGEBTC");
        assert_eq!(
            coordinator.fetch_and_install(&unknown).await.unwrap_err(),
            SyncError::SnapshotFetch {
                message: "unknown symbol: binance:spot:DOGEBTC".into()
            }
        );
        assert_eq!(
            coordinator.fetch_and_install(&key()).await.unwrap_err(),
            SyncError::SnapshotFetch {
                message: "malformed snapshot: missing lastUpdateId".into()
            }
        );
    }

    #[tokio::test]
    async fn test_negative_quantity_is_fetch_error() {
        let snapshot = SnapshotData::new(1, vec![PriceLevel::new(dec!(100), dec!(-1))], vec![]);
        let coordinator = SnapshotCoordinator::new(Arc::new(FixedSource(Ok(snapshot))));

        let err = coordinator.fetch_and_install(&key()).await.unwrap_err();
        assert!(matches!(err, SyncError::SnapshotFetch { .. }));
    }
}
