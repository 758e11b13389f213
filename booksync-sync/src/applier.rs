//! Applies incremental updates to a replica.

use booksync_book::{OrderBookReplica, check_level};
use booksync_core::{IncrementalUpdate, Result, SequencingPolicy, SyncError};

/// Applies one update at a time, enforcing the exchange's continuity rules.
///
/// Continuity is checked before any level is touched, so a rejected update
/// never mutates the replica.
#[derive(Debug, Clone, Copy)]
pub struct DeltaApplier {
    policy: SequencingPolicy,
}

impl DeltaApplier {
    /// Creates an applier for the given sequencing policy.
    #[must_use]
    pub const fn new(policy: SequencingPolicy) -> Self {
        Self { policy }
    }

    /// Returns the sequencing policy.
    #[must_use]
    pub const fn policy(&self) -> SequencingPolicy {
        self.policy
    }

    /// Checks that `update` may be applied next.
    ///
    /// Under id continuity the first update after a snapshot may straddle the
    /// baseline (`first <= baseline + 1 <= last`); every later one must
    /// continue the replica exactly. A `prev_update_id`, when present, must
    /// name the replica's last update, including right after a checksum
    /// policy snapshot.
    ///
    /// # Errors
    /// Returns [`SyncError::StaleUpdate`] if the replica already covers the
    /// update, or [`SyncError::SequenceGap`] if it does not continue it.
    pub fn check_continuity(
        &self,
        replica: &OrderBookReplica,
        update: &IncrementalUpdate,
    ) -> Result<()> {
        let last = replica.last_update_id();

        if update.last_update_id <= last {
            return Err(SyncError::StaleUpdate {
                update_id: update.last_update_id,
                replica_id: last,
            });
        }

        let gap = || SyncError::SequenceGap {
            last_applied: last,
            first: update.first_update_id,
            prev: update.prev_update_id,
        };

        // Id-continuity feeds may straddle the baseline once; a chained feed
        // still has to name the snapshot as its predecessor.
        if replica.awaiting_bridge() && self.policy.requires_id_continuity() {
            return if update.first_update_id > last + 1 {
                Err(gap())
            } else {
                Ok(())
            };
        }

        if let Some(prev) = update.prev_update_id {
            return if prev == last { Ok(()) } else { Err(gap()) };
        }

        if self.policy.requires_id_continuity() && update.first_update_id != last + 1 {
            return Err(gap());
        }

        Ok(())
    }

    /// Applies `update` to `replica`.
    ///
    /// Positive quantities insert or replace a level, zero removes it.
    ///
    /// # Errors
    /// Returns the continuity error from [`DeltaApplier::check_continuity`],
    /// or [`SyncError::MalformedLevel`] for a negative quantity. In both cases
    /// the replica is left untouched.
    pub fn apply(&self, replica: &mut OrderBookReplica, update: &IncrementalUpdate) -> Result<()> {
        self.check_continuity(replica, update)?;

        for (side, level) in update.changes() {
            check_level(side, level)?;
        }

        for (side, level) in update.changes() {
            replica.apply_level(side, *level);
        }

        replica.record_update(
            update.first_update_id,
            update.last_update_id,
            update.checksum,
        );
        Ok(())
    }
}
