//! Output events handed to the publisher.

use crate::types::{PriceLevel, SymbolKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an [`OrderBookEvent`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Top-N view of a freshly installed snapshot; re-baselines consumers.
    Snapshot,
    /// Levels changed by one applied update.
    Delta,
}

/// Validated order book output for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookEvent {
    /// Exchange name.
    pub exchange: String,
    /// Market segment.
    pub market: String,
    /// Exchange symbol.
    pub symbol: String,
    /// Snapshot or delta.
    pub kind: EventKind,
    /// Replica update id after this event.
    pub last_update_id: u64,
    /// Bid levels, best first for snapshots; changed levels for deltas.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first for snapshots; changed levels for deltas.
    pub asks: Vec<PriceLevel>,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

impl OrderBookEvent {
    /// Creates a snapshot event.
    #[must_use]
    pub fn snapshot(
        key: &SymbolKey,
        last_update_id: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self::new(key, EventKind::Snapshot, last_update_id, bids, asks)
    }

    /// Creates a delta event.
    #[must_use]
    pub fn delta(
        key: &SymbolKey,
        last_update_id: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self::new(key, EventKind::Delta, last_update_id, bids, asks)
    }

    fn new(
        key: &SymbolKey,
        kind: EventKind,
        last_update_id: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self {
            exchange: key.exchange.clone(),
            market: key.market.clone(),
            symbol: key.symbol.clone(),
            kind,
            last_update_id,
            bids,
            asks,
            timestamp: Utc::now(),
        }
    }

    /// Returns the key of the book this event belongs to.
    #[must_use]
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(&self.exchange, &self.market, &self.symbol)
    }

    /// Returns true for snapshot events.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.kind == EventKind::Snapshot
    }
}
