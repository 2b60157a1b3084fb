//! Bounded per-worker task queues.
//!
//! Each worker drains exactly one `TaskQueue`. Submitters on any thread may
//! push concurrently; only the owning worker pops. Capacity is fixed at
//! construction (the pool's affinity group size) and a failed `add` is the
//! only back-pressure signal the queue emits.

use crossbeam::queue::ArrayQueue;

use crate::task::Job;

/// Fixed-capacity FIFO carrying task handles from submitters to one worker.
pub struct TaskQueue {
    items: ArrayQueue<Job>,
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` tasks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; the pool validates its group size before
    /// building queues.
    pub fn with_capacity(capacity: usize) -> Self {
        TaskQueue {
            items: ArrayQueue::new(capacity),
        }
    }

    /// Enqueues a task at the tail.
    ///
    /// Returns the task back to the caller when the queue is full so the
    /// rejection path can report its identity without cloning up front.
    pub fn add(&self, job: Job) -> Result<(), Job> {
        self.items.push(job)
    }

    /// Dequeues the task at the head, or `None` when empty.
    ///
    /// Must only be called by the single worker owning the consumer end.
    pub fn poll(&self) -> Option<Job> {
        self.items.pop()
    }

    /// Whether the queue currently holds no tasks.
    ///
    /// Safe to consult from any thread; the answer may go stale immediately.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of tasks currently queued.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The fixed capacity this queue was built with.
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
}
