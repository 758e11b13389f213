//! Post-apply consistency checks.

use booksync_book::OrderBookReplica;
use booksync_core::{Result, SequencingPolicy, SyncError};

/// Verifies a replica after every apply and every snapshot install.
///
/// A failed check means the replica must be discarded; the validator never
/// repairs anything.
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyValidator {
    policy: SequencingPolicy,
}

impl ConsistencyValidator {
    /// Creates a validator for the given sequencing policy.
    #[must_use]
    pub const fn new(policy: SequencingPolicy) -> Self {
        Self { policy }
    }

    /// Validates `replica`.
    ///
    /// For checksum-sequenced exchanges the top-N checksum is recomputed and
    /// compared with the value recorded from the exchange, when there is one.
    /// The crossed-book check applies to every exchange.
    ///
    /// # Errors
    /// Returns [`SyncError::ChecksumMismatch`] or [`SyncError::CrossedBook`].
    pub fn validate(&self, replica: &OrderBookReplica) -> Result<()> {
        if let (Some(depth), Some(expected)) = (self.policy.checksum_depth(), replica.checksum()) {
            let computed = replica.compute_checksum(depth);
            if computed != expected {
                return Err(SyncError::ChecksumMismatch {
                    update_id: replica.last_update_id(),
                    expected,
                    computed,
                });
            }
        }

        if let Some((best_bid, best_ask)) = replica.crossed_prices() {
            return Err(SyncError::CrossedBook { best_bid, best_ask });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booksync_core::{PriceLevel, SnapshotData, SymbolKey};
    use rust_decimal_macros::dec;

    fn key() -> SymbolKey {
        SymbolKey::new("okx", "spot", "BTC-USDT")
    }

    fn snapshot(checksum: Option<i64>) -> SnapshotData {
        let mut snapshot = SnapshotData::new(
            7,
            vec![
                PriceLevel::new(dec!(3366.1), dec!(7)),
                PriceLevel::new(dec!(3366), dec!(6)),
            ],
            vec![
                PriceLevel::new(dec!(3366.8), dec!(9)),
                PriceLevel::new(dec!(3368), dec!(8)),
            ],
        );
        snapshot.checksum = checksum;
        snapshot
    }

    #[test]
    fn test_valid_book_passes() {
        let validator = ConsistencyValidator::new(SequencingPolicy::UpdateId);
        let replica = OrderBookReplica::from_snapshot(key(), &snapshot(None)).unwrap();
        assert!(validator.validate(&replica).is_ok());
    }

    #[test]
    fn test_crossed_book_detected() {
        let validator = ConsistencyValidator::new(SequencingPolicy::UpdateId);
        let mut replica = OrderBookReplica::from_snapshot(key(), &snapshot(None)).unwrap();
        replica.apply_level(
            booksync_core::Side::Bid,
            PriceLevel::new(dec!(3366.8), dec!(1)),
        );

        assert_eq!(
            validator.validate(&replica),
            Err(SyncError::CrossedBook {
                best_bid: dec!(3366.8),
                best_ask: dec!(3366.8)
            })
        );
    }

    #[test]
    fn test_matching_checksum_passes() {
        let policy = SequencingPolicy::checksum();
        let validator = ConsistencyValidator::new(policy);
        let reference = OrderBookReplica::from_snapshot(key(), &snapshot(None)).unwrap();
        let expected = reference.compute_checksum(25);

        let replica = OrderBookReplica::from_snapshot(key(), &snapshot(Some(expected))).unwrap();
        assert!(validator.validate(&replica).is_ok());
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let validator = ConsistencyValidator::new(SequencingPolicy::checksum());
        let replica = OrderBookReplica::from_snapshot(key(), &snapshot(Some(42))).unwrap();

        match validator.validate(&replica) {
            Err(SyncError::ChecksumMismatch {
                update_id,
                expected,
                computed,
            }) => {
                assert_eq!(update_id, 7);
                assert_eq!(expected, 42);
                assert_ne!(computed, 42);
            }
            other => panic!("expected checksum mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_update_id_policy_ignores_checksum() {
        let validator = ConsistencyValidator::new(SequencingPolicy::UpdateId);
        let replica = OrderBookReplica::from_snapshot(key(), &snapshot(Some(42))).unwrap();
        assert!(validator.validate(&replica).is_ok());
    }
}
