//! Sticky task-to-queue routing.
//!
//! The router assigns every fresh [`TaskKey`] a queue index seeded from a
//! wrapping round-robin counter, then pins the key to that index for the rest
//! of the pool's lifetime. The map only grows; affinity is never re-randomized.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::task::TaskKey;

/// Maps task identities to queue indices in `[0, slots)`.
pub struct Router {
    slots: usize,
    /// `Some(slots - 1)` when `slots` is a power of two; the cheap mask path.
    mask: Option<usize>,
    counter: AtomicUsize,
    assignments: DashMap<TaskKey, usize>,
}

impl Router {
    /// Creates a router over `slots` queues. `slots` must be at least 1; the
    /// pool validates parallelism before building the router.
    pub fn new(slots: usize) -> Self {
        debug_assert!(slots >= 1);
        Router {
            slots,
            mask: if slots.is_power_of_two() {
                Some(slots - 1)
            } else {
                None
            },
            counter: AtomicUsize::new(0),
            assignments: DashMap::new(),
        }
    }

    /// Returns the sticky queue index for `key`.
    ///
    /// Fresh keys draw the next round-robin index. The counter increment and
    /// the map insertion are deliberately not one atomic step: two racing
    /// submissions of a fresh key may each draw an index, and the loser runs
    /// once on its own draw before following the winner. `entry().or_insert()`
    /// holds the map shard across check-and-insert, so the winning index is
    /// what this method returns even for the losing submitter.
    pub fn route(&self, key: TaskKey) -> usize {
        if let Some(idx) = self.assignments.get(&key) {
            return *idx;
        }

        let draw = self.counter.fetch_add(1, Ordering::Relaxed);
        let idx = match self.mask {
            Some(mask) => draw & mask,
            None => draw % self.slots,
        };
        *self.assignments.entry(key).or_insert(idx)
    }

    /// Number of task identities routed so far.
    pub fn routed_keys(&self) -> usize {
        self.assignments.len()
    }
}
