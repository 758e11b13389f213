//! Top-N order book checksums.
//!
//! Checksum-sequenced exchanges publish a CRC-32 over the best levels of the
//! book after every update. Levels are interleaved bid then ask at each depth
//! index as `price:quantity`, joined by `:`; a side that has run out of levels
//! is skipped at that index. The CRC is reported as a signed 32-bit integer.

use crate::level_set::PriceLevelSet;
use std::fmt::Write as _;

/// Builds the string the checksum is computed over.
#[must_use]
pub fn checksum_payload(bids: &PriceLevelSet, asks: &PriceLevelSet, depth: usize) -> String {
    let bids = bids.top_n(depth);
    let asks = asks.top_n(depth);
    let mut payload = String::with_capacity(depth * 32);

    for i in 0..depth {
        for level in [bids.get(i), asks.get(i)].into_iter().flatten() {
            if !payload.is_empty() {
                payload.push(':');
            }
            write!(payload, "{}:{}", level.price, level.quantity).ok();
        }
    }

    payload
}

/// Computes the signed CRC-32 checksum over the top `depth` levels.
#[must_use]
pub fn top_levels_checksum(bids: &PriceLevelSet, asks: &PriceLevelSet, depth: usize) -> i64 {
    let payload = checksum_payload(bids, asks, depth);
    i64::from(crc32fast::hash(payload.as_bytes()) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use booksync_core::{PriceLevel, Side};
    use rust_decimal_macros::dec;

    fn sides() -> (PriceLevelSet, PriceLevelSet) {
        let mut bids = PriceLevelSet::new(Side::Bid);
        let mut asks = PriceLevelSet::new(Side::Ask);
        bids.apply(PriceLevel::new(dec!(3366.1), dec!(7)));
        bids.apply(PriceLevel::new(dec!(3366), dec!(6)));
        asks.apply(PriceLevel::new(dec!(3366.8), dec!(9)));
        asks.apply(PriceLevel::new(dec!(3368), dec!(8)));
        (bids, asks)
    }

    #[test]
    fn test_payload_interleaves_sides() {
        let (bids, asks) = sides();
        assert_eq!(
            checksum_payload(&bids, &asks, 25),
            "3366.1:7:3366.8:9:3366:6:3368:8"
        );
    }

    #[test]
    fn test_payload_skips_exhausted_side() {
        let (bids, mut asks) = sides();
        asks.apply(PriceLevel::new(dec!(3368), dec!(0)));
        assert_eq!(
            checksum_payload(&bids, &asks, 25),
            "3366.1:7:3366.8:9:3366:6"
        );
    }

    #[test]
    fn test_payload_respects_depth() {
        let (bids, asks) = sides();
        assert_eq!(checksum_payload(&bids, &asks, 1), "3366.1:7:3366.8:9");
    }

    #[test]
    fn test_checksum_is_signed_crc32_of_payload() {
        let (bids, asks) = sides();
        let expected = crc32fast::hash(b"3366.1:7:3366.8:9:3366:6:3368:8") as i32;
        assert_eq!(top_levels_checksum(&bids, &asks, 25), i64::from(expected));
    }

    #[test]
    fn test_empty_book_checksum() {
        let bids = PriceLevelSet::new(Side::Bid);
        let asks = PriceLevelSet::new(Side::Ask);
        assert_eq!(checksum_payload(&bids, &asks, 25), "");
        assert_eq!(top_levels_checksum(&bids, &asks, 25), 0);
    }
}
