//! Bounded buffer for updates that cannot be applied yet.

use booksync_core::IncrementalUpdate;
use std::collections::VecDeque;

/// An update held in the buffer with its arrival order.
#[derive(Debug, Clone)]
pub struct BufferedUpdate {
    /// Monotonic arrival sequence within this buffer.
    pub arrival: u64,
    /// The buffered update.
    pub update: IncrementalUpdate,
}

/// Result of draining the buffer against a snapshot baseline.
#[derive(Debug, Default)]
pub struct Drained {
    /// Updates past the baseline, in arrival order.
    pub applicable: Vec<BufferedUpdate>,
    /// Updates already covered by the baseline.
    pub discarded: usize,
}

/// Bounded FIFO of updates waiting for a snapshot.
///
/// When full, pushing drops the oldest entry and flags overflow; a dropped
/// update breaks continuity, so the owner must resync.
#[derive(Debug)]
pub struct UpdateBuffer {
    entries: VecDeque<BufferedUpdate>,
    capacity: usize,
    next_arrival: u64,
    overflowed: bool,
}

impl UpdateBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            next_arrival: 0,
            overflowed: false,
        }
    }

    /// Appends an update, returning the evicted entry if the buffer was full.
    pub fn push(&mut self, update: IncrementalUpdate) -> Option<BufferedUpdate> {
        let evicted = if self.entries.len() >= self.capacity {
            self.overflowed = true;
            self.entries.pop_front()
        } else {
            None
        };

        self.entries.push_back(BufferedUpdate {
            arrival: self.next_arrival,
            update,
        });
        self.next_arrival += 1;

        evicted
    }

    /// Empties the buffer, keeping in arrival order only the updates whose
    /// last id is after `baseline_id`.
    pub fn drain_applicable(&mut self, baseline_id: u64) -> Drained {
        let mut drained = Drained::default();
        for entry in self.entries.drain(..) {
            if entry.update.last_update_id > baseline_id {
                drained.applicable.push(entry);
            } else {
                drained.discarded += 1;
            }
        }
        self.overflowed = false;
        drained
    }

    /// Discards every entry and clears the overflow flag.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.overflowed = false;
    }

    /// Returns true if an entry was dropped since the last clear or drain.
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Returns the maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over buffered entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &BufferedUpdate> {
        self.entries.iter()
    }
}
