//! One side of an order book.

use booksync_core::{PriceLevel, Side};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Ordered price levels for one side of the book.
///
/// Bids iterate descending and asks ascending, so "first" is always the best
/// price. Prices are unique per side.
#[derive(Debug, Clone)]
pub struct PriceLevelSet {
    levels: BTreeMap<Decimal, Decimal>,
    side: Side,
}

impl PriceLevelSet {
    /// Creates an empty set for the given side.
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            levels: BTreeMap::new(),
            side,
        }
    }

    /// Returns the side this set holds.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Applies a level change: a positive quantity inserts or replaces the
    /// price, zero removes it. Removing an absent price is a no-op.
    #[inline]
    pub fn apply(&mut self, level: PriceLevel) {
        if level.is_removal() {
            self.levels.remove(&level.price);
        } else {
            self.levels.insert(level.price, level.quantity);
        }
    }

    /// Removes a price, returning its quantity if it was present.
    pub fn remove(&mut self, price: Decimal) -> Option<Decimal> {
        self.levels.remove(&price)
    }

    /// Returns the best level.
    #[inline]
    #[must_use]
    pub fn best(&self) -> Option<PriceLevel> {
        let entry = match self.side {
            Side::Bid => self.levels.iter().next_back(),
            Side::Ask => self.levels.iter().next(),
        };
        entry.map(|(price, quantity)| PriceLevel::new(*price, *quantity))
    }

    /// Returns the `n` best levels, best first.
    #[must_use]
    pub fn top_n(&self, n: usize) -> Vec<PriceLevel> {
        self.iter().take(n).collect()
    }

    /// Returns the quantity at a price.
    #[must_use]
    pub fn get(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).copied()
    }

    /// Iterates over all levels, best first.
    pub fn iter(&self) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let levels = self
            .levels
            .iter()
            .map(|(price, quantity)| PriceLevel::new(*price, *quantity));
        match self.side {
            Side::Bid => Box::new(levels.rev()),
            Side::Ask => Box::new(levels),
        }
    }

    /// Clears all levels.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Returns the number of price levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if there are no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, quantity: Decimal) -> PriceLevel {
        PriceLevel::new(price, quantity)
    }

    #[test]
    fn test_bid_side_update() {
        let mut bids = PriceLevelSet::new(Side::Bid);

        bids.apply(level(dec!(100), dec!(50)));
        assert_eq!(bids.len(), 1);
        assert_eq!(bids.best().unwrap().price, dec!(100));

        bids.apply(level(dec!(101), dec!(30)));
        assert_eq!(bids.len(), 2);
        assert_eq!(bids.best().unwrap().price, dec!(101)); // Best bid is highest

        // Delete level
        bids.apply(level(dec!(101), dec!(0)));
        assert_eq!(bids.len(), 1);
        assert_eq!(bids.best().unwrap().price, dec!(100));
    }

    #[test]
    fn test_ask_top_n() {
        let mut asks = PriceLevelSet::new(Side::Ask);

        asks.apply(level(dec!(103), dec!(40)));
        asks.apply(level(dec!(100), dec!(10)));
        asks.apply(level(dec!(102), dec!(30)));
        asks.apply(level(dec!(101), dec!(20)));

        let best = asks.top_n(2);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].price, dec!(100)); // Best ask is lowest
        assert_eq!(best[1].price, dec!(101));
    }

    #[test]
    fn test_replace_existing_level() {
        let mut bids = PriceLevelSet::new(Side::Bid);
        bids.apply(level(dec!(100), dec!(50)));
        bids.apply(level(dec!(100), dec!(75)));

        assert_eq!(bids.len(), 1);
        assert_eq!(bids.get(dec!(100)), Some(dec!(75)));
    }

    #[test]
    fn test_remove_absent_level_is_noop() {
        let mut asks = PriceLevelSet::new(Side::Ask);
        asks.apply(level(dec!(100), dec!(1)));

        asks.apply(level(dec!(99), dec!(0)));
        assert_eq!(asks.len(), 1);
        assert_eq!(asks.remove(dec!(98)), None);
    }

    #[test]
    fn test_equal_prices_with_different_scale_share_a_level() {
        let mut bids = PriceLevelSet::new(Side::Bid);
        bids.apply(level(dec!(100.0), dec!(1)));
        bids.apply(level(dec!(100.00), dec!(2)));

        assert_eq!(bids.len(), 1);
        assert_eq!(bids.get(dec!(100)), Some(dec!(2)));
    }

    #[test]
    fn test_iteration_is_strictly_ordered() {
        let mut bids = PriceLevelSet::new(Side::Bid);
        let mut asks = PriceLevelSet::new(Side::Ask);
        for (i, price) in [dec!(5), dec!(1), dec!(4), dec!(2), dec!(3)].into_iter().enumerate() {
            bids.apply(level(price, Decimal::from(i + 1)));
            asks.apply(level(price + dec!(10), Decimal::from(i + 1)));
        }

        let bid_prices: Vec<Decimal> = bids.iter().map(|l| l.price).collect();
        assert!(bid_prices.windows(2).all(|w| w[0] > w[1]));

        let ask_prices: Vec<Decimal> = asks.iter().map(|l| l.price).collect();
        assert!(ask_prices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_clear() {
        let mut bids = PriceLevelSet::new(Side::Bid);
        bids.apply(level(dec!(100), dec!(50)));
        bids.apply(level(dec!(101), dec!(30)));

        bids.clear();
        assert!(bids.is_empty());
        assert!(bids.best().is_none());
    }
}
