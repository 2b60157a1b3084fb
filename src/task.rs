//! Task handles and their identity keys.
//!
//! A [`Job`] is a cheap, clonable handle around a shared closure. All clones
//! of one handle are "the same task" as far as the pool is concerned: they
//! carry the same [`TaskKey`] and therefore route to the same worker queue.

use std::fmt;
use std::sync::Arc;

/// Stable, content-independent identity of a task handle.
///
/// The key is derived from the address of the handle's shared allocation, so
/// two clones of one [`Job`] always compare equal while two independently
/// constructed jobs never do, even if they wrap identical closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey(usize);

impl TaskKey {
    /// Raw key value, useful for diagnostics.
    pub fn value(self) -> usize {
        self.0
    }
}

struct JobInner {
    work: Box<dyn Fn() + Send + Sync + 'static>,
}

/// A resubmittable unit of work.
///
/// Unlike a one-shot closure, a `Job` can be submitted to the pool any number
/// of times; repeated submissions of the same handle converge onto a single
/// worker thread.
///
/// # Example
///
/// ```
/// use corebound::Job;
///
/// let job = Job::new(|| {
///     // short, CPU-bound work
/// });
/// let again = job.clone();
/// assert_eq!(job.key(), again.key());
/// ```
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// Wraps a closure into a submittable handle.
    pub fn new<F>(work: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Job {
            inner: Arc::new(JobInner {
                work: Box::new(work),
            }),
        }
    }

    /// Returns this handle's identity key.
    pub fn key(&self) -> TaskKey {
        TaskKey(Arc::as_ptr(&self.inner) as usize)
    }

    /// Runs the task. A panic in the closure propagates to the caller.
    pub(crate) fn run(&self) {
        (self.inner.work)();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job@{:#x}", self.key().0)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
