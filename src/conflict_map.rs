//! The bounded conflict map `M`: a fixed-capacity, direct-mapped table from
//! row fingerprint to the commit timestamp of its most recent writer.
//!
//! Indexing by `fingerprint.0 % capacity` with a single-slot probe (no
//! chaining, no secondary probing) is a load-bearing design choice, not an
//! optimization shortcut: every insertion either finds its slot empty or
//! evicts exactly the one entry occupying it, so eviction is always O(1)
//! and the caller always learns about the single timestamp being forgotten.
//! That's what lets the low-watermark invariant hold with a one-line fold
//! at the call site instead of a full table scan.
//!
//! Mutated by exactly one thread (the request processor), so it carries no
//! internal synchronization.

use crate::types::{RowFingerprint, Timestamp};

#[derive(Clone, Copy)]
struct Entry {
    row: RowFingerprint,
    commit_ts: Timestamp,
}

/// Fixed-capacity, single-mutator conflict map.
pub struct ConflictMap {
    slots: Box<[Option<Entry>]>,
    capacity: usize,
}

impl ConflictMap {
    /// Builds a conflict map with room for `capacity` live entries.
    /// `capacity` must be nonzero.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            capacity,
        }
    }

    fn index(&self, row: RowFingerprint) -> usize {
        (row.0 as usize) % self.capacity
    }

    /// Returns the commit timestamp most recently recorded for `row`, if
    /// its slot currently holds an entry for it. A fingerprint collision
    /// with a different row in the same slot is indistinguishable from "row
    /// present" by design — the caller treats it as a conflict.
    pub fn get(&self, row: RowFingerprint) -> Option<Timestamp> {
        self.slots[self.index(row)].map(|e| e.commit_ts)
    }

    /// Records that `row` was written at `commit_ts`, evicting and
    /// returning whatever previously occupied its slot (which may be a
    /// different row, if its fingerprint collided with `row`'s).
    pub fn insert(&mut self, row: RowFingerprint, commit_ts: Timestamp) -> Option<Timestamp> {
        let idx = self.index(row);
        let evicted = self.slots[idx].take();
        self.slots[idx] = Some(Entry { row, commit_ts });
        evicted.map(|e| e.commit_ts)
    }

    /// Capacity `C` the map was built with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
