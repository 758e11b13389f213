//! Error taxonomy for order book synchronization.

use crate::types::Side;
use rust_decimal::Decimal;
use thiserror::Error;

/// How loudly an error should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Expected noise, e.g. duplicate deliveries.
    Debug,
    /// Recoverable by resync or retry.
    Warning,
    /// Indicates a bug upstream of the sequencing checks.
    Critical,
}

/// Error type for synchronization operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The REST collaborator failed to return a usable snapshot.
    #[error("snapshot fetch failed: {message}")]
    SnapshotFetch {
        /// Error message from the collaborator.
        message: String,
    },

    /// An update does not continue the replica's sequence.
    #[error("sequence gap after update {last_applied}: update first id {first}, prev id {prev:?}")]
    SequenceGap {
        /// Last update id applied to the replica.
        last_applied: u64,
        /// First update id of the offending update.
        first: u64,
        /// Previous update id reported by the offending update.
        prev: Option<u64>,
    },

    /// The checksum after applying an update does not match the exchange's.
    #[error("checksum mismatch at update {update_id}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// Update id the checksum was supplied with.
        update_id: u64,
        /// Checksum supplied by the exchange.
        expected: i64,
        /// Checksum computed from the replica.
        computed: i64,
    },

    /// Best bid is not strictly below best ask.
    #[error("crossed book: best bid {best_bid} >= best ask {best_ask}")]
    CrossedBook {
        /// Best bid price.
        best_bid: Decimal,
        /// Best ask price.
        best_ask: Decimal,
    },

    /// Updates arrived faster than the snapshot could be fetched.
    #[error("update buffer overflow at capacity {capacity}")]
    BufferOverflow {
        /// Buffer capacity.
        capacity: usize,
    },

    /// Update already covered by the replica (duplicate or late delivery).
    #[error("stale update: last id {update_id} not after replica id {replica_id}")]
    StaleUpdate {
        /// Last update id of the update.
        update_id: u64,
        /// Last update id of the replica.
        replica_id: u64,
    },

    /// Snapshot that does not advance past what was already published
    /// downstream.
    #[error("stale snapshot: id {snapshot_id} not newer than last emitted {last_emitted}")]
    StaleSnapshot {
        /// Update id of the snapshot.
        snapshot_id: u64,
        /// Last update id emitted downstream.
        last_emitted: u64,
    },

    /// A level with a negative quantity.
    #[error("malformed {side} level: price {price}, quantity {quantity}")]
    MalformedLevel {
        /// Side of the level.
        side: Side,
        /// Level price.
        price: Decimal,
        /// Level quantity.
        quantity: Decimal,
    },

    /// The publisher did not accept an event in time.
    #[error("publisher timed out after {timeout_ms} ms")]
    PublishTimeout {
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The publisher rejected an event.
    #[error("publish failed: {message}")]
    Publish {
        /// Error message from the publisher.
        message: String,
    },
}

impl SyncError {
    /// Creates a snapshot fetch error from any displayable error.
    pub fn snapshot_fetch(err: impl std::fmt::Display) -> Self {
        Self::SnapshotFetch {
            message: err.to_string(),
        }
    }

    /// Returns true if this error invalidates the replica and forces a resync.
    #[must_use]
    pub const fn is_resync_trigger(&self) -> bool {
        !matches!(self, Self::StaleUpdate { .. })
    }

    /// Returns the reporting severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::StaleUpdate { .. } => Severity::Debug,
            Self::CrossedBook { .. } | Self::MalformedLevel { .. } => Severity::Critical,
            _ => Severity::Warning,
        }
    }
}

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
