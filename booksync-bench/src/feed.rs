//! Synthetic depth feeds for benchmarks.

use booksync_core::{IncrementalUpdate, PriceLevel, SnapshotData, SymbolKey};
use rust_decimal::Decimal;

/// Generates a deterministic, never-crossing depth stream around a mid price.
///
/// Bids live strictly below the mid and asks strictly above it, so any
/// sequence of generated updates keeps the book valid.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    key: SymbolKey,
    mid: Decimal,
    tick: Decimal,
    depth: u64,
    next_id: u64,
}

impl SyntheticFeed {
    /// Creates a feed with `depth` price levels per side.
    #[must_use]
    pub fn new(key: SymbolKey, depth: u64) -> Self {
        Self {
            key,
            mid: Decimal::from(50_000),
            tick: Decimal::new(1, 1),
            depth: depth.max(1),
            next_id: 1,
        }
    }

    /// Returns the symbol of this feed.
    #[must_use]
    pub fn key(&self) -> &SymbolKey {
        &self.key
    }

    /// Returns a full snapshot at the current position of the stream.
    #[must_use]
    pub fn snapshot(&self) -> SnapshotData {
        let bids = (1..=self.depth)
            .map(|i| PriceLevel::new(self.price(i, true), Decimal::from(i)))
            .collect();
        let asks = (1..=self.depth)
            .map(|i| PriceLevel::new(self.price(i, false), Decimal::from(i)))
            .collect();
        SnapshotData::new(self.next_id - 1, bids, asks)
    }

    /// Returns the next update, touching `changes` levels per side.
    ///
    /// Every seventh touched level is removed.
    pub fn next_update(&mut self, changes: u64) -> IncrementalUpdate {
        let id = self.next_id;
        self.next_id += 1;

        let level = |offset: u64, bid: bool| {
            let distance = (id + offset) % self.depth + 1;
            let quantity = if (id + offset) % 7 == 0 {
                Decimal::ZERO
            } else {
                Decimal::from((id + offset) % 13 + 1)
            };
            PriceLevel::new(self.price(distance, bid), quantity)
        };

        let bids = (0..changes).map(|o| level(o, true)).collect();
        let asks = (0..changes).map(|o| level(o, false)).collect();

        IncrementalUpdate::new(&self.key, id, id)
            .with_bids(bids)
            .with_asks(asks)
    }

    fn price(&self, distance: u64, bid: bool) -> Decimal {
        let offset = self.tick * Decimal::from(distance);
        if bid { self.mid - offset } else { self.mid + offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booksync_book::OrderBookReplica;
    use booksync_core::SequencingPolicy;
    use booksync_sync::DeltaApplier;

    #[test]
    fn test_feed_is_continuous_and_uncrossed() {
        let mut feed = SyntheticFeed::new(SymbolKey::new("bench", "spot", "SYN"), 50);
        let mut replica = OrderBookReplica::from_snapshot(feed.key().clone(), &feed.snapshot()).unwrap();
        let applier = DeltaApplier::new(SequencingPolicy::UpdateId);

        for _ in 0..500 {
            let update = feed.next_update(4);
            applier.apply(&mut replica, &update).unwrap();
            assert!(!replica.is_crossed());
        }
        assert_eq!(replica.last_update_id(), 500);
    }
}
