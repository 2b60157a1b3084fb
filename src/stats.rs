//! Lock-free pool statistics.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Internal counters bumped on the hot paths with relaxed atomics.
pub(crate) struct PoolCounters {
    pub(crate) live_workers: AtomicUsize,
    pub(crate) tasks_executed: AtomicU64,
    pub(crate) tasks_rejected: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn new() -> Self {
        PoolCounters {
            live_workers: AtomicUsize::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self, queue_depths: Vec<usize>) -> PoolStats {
        PoolStats {
            workers: self.live_workers.load(Ordering::Relaxed),
            queue_depths,
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of a pool's activity.
///
/// Assembled without touching the bookkeeping lock; the values are individually
/// accurate but not mutually consistent.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Workers currently registered.
    pub workers: usize,
    /// Occupied slots in each queue, indexed by queue.
    pub queue_depths: Vec<usize>,
    /// Tasks that completed execution.
    pub tasks_executed: u64,
    /// Submissions refused (pool not running or queue full).
    pub tasks_rejected: u64,
}
