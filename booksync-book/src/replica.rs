//! Local replica of one exchange order book.

use crate::checksum::top_levels_checksum;
use crate::level_set::PriceLevelSet;
use booksync_core::{PriceLevel, Result, Side, SnapshotData, SymbolKey, SyncError};
use rust_decimal::Decimal;

/// Bids, asks and sequencing metadata for exactly one symbol.
///
/// Created empty at subscription, replaced wholesale from a snapshot on every
/// (re)sync and mutated in between only by the delta applier.
#[derive(Debug, Clone)]
pub struct OrderBookReplica {
    key: SymbolKey,
    bids: PriceLevelSet,
    asks: PriceLevelSet,
    last_update_id: u64,
    first_update_id_of_last_update: u64,
    checksum: Option<i64>,
    awaiting_bridge: bool,
}

impl OrderBookReplica {
    /// Creates an empty replica.
    #[must_use]
    pub fn new(key: SymbolKey) -> Self {
        Self {
            key,
            bids: PriceLevelSet::new(Side::Bid),
            asks: PriceLevelSet::new(Side::Ask),
            last_update_id: 0,
            first_update_id_of_last_update: 0,
            checksum: None,
            awaiting_bridge: false,
        }
    }

    /// Builds a replica baseline from a snapshot.
    ///
    /// Zero-quantity levels are skipped.
    ///
    /// # Errors
    /// Returns [`SyncError::MalformedLevel`] if any level has a negative quantity.
    pub fn from_snapshot(key: SymbolKey, snapshot: &SnapshotData) -> Result<Self> {
        let mut replica = Self::new(key);

        for (side, levels) in [(Side::Bid, &snapshot.bids), (Side::Ask, &snapshot.asks)] {
            for level in levels {
                check_level(side, level)?;
                replica.apply_level(side, *level);
            }
        }

        replica.last_update_id = snapshot.last_update_id;
        replica.first_update_id_of_last_update = snapshot.last_update_id;
        replica.checksum = snapshot.checksum;
        replica.awaiting_bridge = true;
        Ok(replica)
    }

    /// Returns the key of this book.
    #[must_use]
    pub fn key(&self) -> &SymbolKey {
        &self.key
    }

    /// Returns the bid side.
    #[must_use]
    pub fn bids(&self) -> &PriceLevelSet {
        &self.bids
    }

    /// Returns the ask side.
    #[must_use]
    pub fn asks(&self) -> &PriceLevelSet {
        &self.asks
    }

    /// Returns the given side.
    #[must_use]
    pub fn side(&self, side: Side) -> &PriceLevelSet {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Returns the best bid level.
    #[inline]
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best()
    }

    /// Returns the best ask level.
    #[inline]
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best()
    }

    /// Returns the bid-ask spread.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Returns the mid price.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// Returns the best bid and ask prices if the book is crossed or locked.
    #[must_use]
    pub fn crossed_prices(&self) -> Option<(Decimal, Decimal)> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if bid.price >= ask.price => Some((bid.price, ask.price)),
            _ => None,
        }
    }

    /// Returns true if best bid is not strictly below best ask.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        self.crossed_prices().is_some()
    }

    /// Returns the last applied update id.
    #[must_use]
    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    /// Returns the first update id of the last applied update.
    #[must_use]
    pub fn first_update_id_of_last_update(&self) -> u64 {
        self.first_update_id_of_last_update
    }

    /// Returns the exchange checksum recorded with the last update.
    #[must_use]
    pub fn checksum(&self) -> Option<i64> {
        self.checksum
    }

    /// Returns true until the first update after a snapshot has been applied.
    #[must_use]
    pub fn awaiting_bridge(&self) -> bool {
        self.awaiting_bridge
    }

    /// Applies one level change to a side.
    #[inline]
    pub fn apply_level(&mut self, side: Side, level: PriceLevel) {
        match side {
            Side::Bid => self.bids.apply(level),
            Side::Ask => self.asks.apply(level),
        }
    }

    /// Records the sequencing metadata of an applied update.
    pub fn record_update(&mut self, first_update_id: u64, last_update_id: u64, checksum: Option<i64>) {
        self.first_update_id_of_last_update = first_update_id;
        self.last_update_id = last_update_id;
        self.checksum = checksum;
        self.awaiting_bridge = false;
    }

    /// Returns the `n` best levels of each side.
    #[must_use]
    pub fn top_n(&self, n: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        (self.bids.top_n(n), self.asks.top_n(n))
    }

    /// Computes the top-N checksum of the current levels.
    #[must_use]
    pub fn compute_checksum(&self, depth: usize) -> i64 {
        top_levels_checksum(&self.bids, &self.asks, depth)
    }

    /// Clears both sides and the sequencing metadata.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_update_id = 0;
        self.first_update_id_of_last_update = 0;
        self.checksum = None;
        self.awaiting_bridge = false;
    }
}

/// Rejects levels no exchange can legitimately send.
///
/// # Errors
/// Returns [`SyncError::MalformedLevel`] for a negative quantity.
pub fn check_level(side: Side, level: &PriceLevel) -> Result<()> {
    if level.is_malformed() {
        return Err(SyncError::MalformedLevel {
            side,
            price: level.price,
            quantity: level.quantity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key() -> SymbolKey {
        SymbolKey::new("binance", "spot", "BTCUSDT")
    }

    fn snapshot() -> SnapshotData {
        SnapshotData::new(
            100,
            vec![
                PriceLevel::new(dec!(50000), dec!(1)),
                PriceLevel::new(dec!(49990), dec!(2)),
            ],
            vec![
                PriceLevel::new(dec!(50010), dec!(1)),
                PriceLevel::new(dec!(50020), dec!(3)),
            ],
        )
    }

    #[test]
    fn test_new_replica_is_empty() {
        let replica = OrderBookReplica::new(key());
        assert!(replica.best_bid().is_none());
        assert!(replica.best_ask().is_none());
        assert_eq!(replica.last_update_id(), 0);
        assert!(!replica.is_crossed());
        assert!(!replica.awaiting_bridge());
    }

    #[test]
    fn test_from_snapshot() {
        let replica = OrderBookReplica::from_snapshot(key(), &snapshot()).unwrap();

        assert_eq!(replica.best_bid().unwrap().price, dec!(50000));
        assert_eq!(replica.best_ask().unwrap().price, dec!(50010));
        assert_eq!(replica.last_update_id(), 100);
        assert_eq!(replica.spread(), Some(dec!(10)));
        assert_eq!(replica.mid_price(), Some(dec!(50005)));
        assert!(replica.awaiting_bridge());
    }

    #[test]
    fn test_from_snapshot_skips_zero_levels() {
        let mut data = snapshot();
        data.bids.push(PriceLevel::new(dec!(49980), dec!(0)));

        let replica = OrderBookReplica::from_snapshot(key(), &data).unwrap();
        assert_eq!(replica.bids().len(), 2);
    }

    #[test]
    fn test_from_snapshot_rejects_negative_quantity() {
        let mut data = snapshot();
        data.asks.push(PriceLevel::new(dec!(50030), dec!(-1)));

        let err = OrderBookReplica::from_snapshot(key(), &data).unwrap_err();
        assert!(matches!(err, SyncError::MalformedLevel { side: Side::Ask, .. }));
    }

    #[test]
    fn test_crossed_detection() {
        let mut replica = OrderBookReplica::from_snapshot(key(), &snapshot()).unwrap();
        assert!(!replica.is_crossed());

        replica.apply_level(Side::Bid, PriceLevel::new(dec!(50010), dec!(1)));
        assert_eq!(replica.crossed_prices(), Some((dec!(50010), dec!(50010))));
    }

    #[test]
    fn test_record_update_clears_bridge() {
        let mut replica = OrderBookReplica::from_snapshot(key(), &snapshot()).unwrap();
        replica.record_update(101, 103, Some(7));

        assert_eq!(replica.first_update_id_of_last_update(), 101);
        assert_eq!(replica.last_update_id(), 103);
        assert_eq!(replica.checksum(), Some(7));
        assert!(!replica.awaiting_bridge());
    }

    #[test]
    fn test_top_n() {
        let replica = OrderBookReplica::from_snapshot(key(), &snapshot()).unwrap();
        let (bids, asks) = replica.top_n(1);
        assert_eq!(bids, vec![PriceLevel::new(dec!(50000), dec!(1))]);
        assert_eq!(asks, vec![PriceLevel::new(dec!(50010), dec!(1))]);
    }

    #[test]
    fn test_clear() {
        let mut replica = OrderBookReplica::from_snapshot(key(), &snapshot()).unwrap();
        replica.clear();
        assert!(replica.bids().is_empty());
        assert!(replica.asks().is_empty());
        assert_eq!(replica.last_update_id(), 0);
    }
}
