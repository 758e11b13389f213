//! Health reporting.

use booksync_core::{SymbolHealth, SymbolKey, SyncState};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Receives a [`SymbolHealth`] record on every state change.
pub trait HealthSink: Send + Sync {
    /// Reports the latest health of a symbol.
    fn report(&self, health: &SymbolHealth);

    /// Called once a symbol is unsubscribed.
    fn remove(&self, _key: &SymbolKey) {}
}

/// Logs health records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHealthSink;

impl HealthSink for TracingHealthSink {
    fn report(&self, health: &SymbolHealth) {
        let key = health.key();
        if health.degraded {
            tracing::error!(
                "{}: degraded in {} ({} consecutive errors, last: {:?})",
                key,
                health.state,
                health.consecutive_errors,
                health.last_error
            );
        } else if health.state == SyncState::Error {
            tracing::warn!("{}: {} ({:?})", key, health.state, health.last_error);
        } else {
            tracing::info!("{}: {}", key, health.state);
        }
    }
}

/// Keeps the latest health record per symbol.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    records: Arc<RwLock<HashMap<SymbolKey, SymbolHealth>>>,
}

impl HealthRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest record for `key`.
    #[must_use]
    pub fn get(&self, key: &SymbolKey) -> Option<SymbolHealth> {
        self.records.read().get(key).cloned()
    }

    /// Returns the latest state for `key`.
    #[must_use]
    pub fn state(&self, key: &SymbolKey) -> Option<SyncState> {
        self.records.read().get(key).map(|h| h.state)
    }

    /// Returns every record.
    #[must_use]
    pub fn all(&self) -> Vec<SymbolHealth> {
        self.records.read().values().cloned().collect()
    }

    /// Returns the keys of degraded symbols.
    #[must_use]
    pub fn degraded(&self) -> Vec<SymbolKey> {
        self.records
            .read()
            .iter()
            .filter(|(_, h)| h.degraded)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Returns the number of tracked symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no symbol is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl HealthSink for HealthRegistry {
    fn report(&self, health: &SymbolHealth) {
        self.records.write().insert(health.key(), health.clone());
    }

    fn remove(&self, key: &SymbolKey) {
        self.records.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_keeps_latest() {
        let registry = HealthRegistry::new();
        let key = SymbolKey::new("binance", "spot", "BTCUSDT");

        registry.report(&SymbolHealth::new(&key, SyncState::Syncing));
        registry.report(&SymbolHealth::new(&key, SyncState::Synced));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state(&key), Some(SyncState::Synced));
    }

    #[test]
    fn test_registry_degraded_and_remove() {
        let registry = HealthRegistry::new();
        let healthy = SymbolKey::new("binance", "spot", "BTCUSDT");
        let broken = SymbolKey::new("binance", "spot", "ETHUSDT");

        registry.report(&SymbolHealth::new(&healthy, SyncState::Synced));
        let mut health = SymbolHealth::new(&broken, SyncState::Error);
        health.degraded = true;
        registry.report(&health);

        assert_eq!(registry.degraded(), vec![broken.clone()]);

        registry.remove(&broken);
        assert!(registry.get(&broken).is_none());
        assert_eq!(registry.all().len(), 1);
    }
}
