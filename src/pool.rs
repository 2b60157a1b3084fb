//! The affinity pool: lifecycle, worker registry and shutdown coordination.
//!
//! One bookkeeping lock (a mutex with an associated condition variable)
//! serializes worker-set mutation, state transitions and termination waits.
//! Everything on the submission path (the state read, the routing lookup,
//! the queue push) is lock-free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::pinning::{AffinityThreadFactory, StdThreadFactory, ThreadFactory};
use crate::queue::TaskQueue;
use crate::router::Router;
use crate::stats::{PoolCounters, PoolStats};
use crate::task::Job;
use crate::wait::WaitStrategy;
use crate::worker::{self, Worker};

/// Pool lifecycle states, totally ordered by rank.
///
/// Transitions only ever move forward:
///
/// ```text
/// Running ──shutdown()──► ShuttingDown ──(last worker drains)──► ShutDown ──► Terminated
///   │                                                               ▲
///   └──────────shutdown_now()──────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PoolState {
    /// Accepting and executing submissions.
    Running = 0,
    /// Draining: no new submissions, queued work still runs.
    ShuttingDown = 1,
    /// Hard-stopped: queued work is abandoned, workers are exiting.
    ShutDown = 2,
    /// All workers gone; `await_termination` observers have been woken.
    Terminated = 3,
}

impl PoolState {
    fn from_rank(rank: u8) -> PoolState {
        match rank {
            0 => PoolState::Running,
            1 => PoolState::ShuttingDown,
            2 => PoolState::ShutDown,
            _ => PoolState::Terminated,
        }
    }

    /// Integer rank used for cheap ordered comparisons.
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Worker set, mutated only under the bookkeeping lock.
struct Registry {
    workers: HashMap<usize, Worker>,
}

impl Registry {
    fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// State shared between the pool facade and its worker threads.
pub(crate) struct PoolCore {
    pub(crate) name: String,
    pub(crate) queues: Vec<TaskQueue>,
    pub(crate) wait_strategy: WaitStrategy,
    pub(crate) thread_factory: Arc<dyn ThreadFactory>,
    pub(crate) counters: PoolCounters,
    router: Router,
    state: AtomicU8,
    worker_ids: AtomicUsize,
    registry: Mutex<Registry>,
    terminated: Condvar,
}

impl PoolCore {
    /// Lock-free state read.
    pub(crate) fn state(&self) -> PoolState {
        PoolState::from_rank(self.state.load(Ordering::Acquire))
    }

    /// Moves the state forward to `target` if it is ahead of the current
    /// state. Callers hold the bookkeeping lock.
    fn advance_state(&self, target: PoolState) {
        let current = self.state();
        if target > current {
            self.state.store(target.rank(), Ordering::Release);
            debug!(pool = %self.name, from = ?current, to = ?target, "state transition");
        }
    }

    pub(crate) fn next_worker_id(&self) -> usize {
        self.worker_ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Acquires the bookkeeping lock, recovering the guard if a previous
    /// holder panicked. The registry only holds handles, so it stays
    /// structurally sound across a poisoned lock.
    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn register(&self, registry: &mut Registry, worker: Worker) {
        self.counters.live_workers.fetch_add(1, Ordering::Relaxed);
        registry.workers.insert(worker.id(), worker);
    }

    fn unregister(&self, registry: &mut Registry, id: usize) -> Option<Worker> {
        let worker = registry.workers.remove(&id);
        if worker.is_some() {
            self.counters.live_workers.fetch_sub(1, Ordering::Relaxed);
        }
        worker
    }

    /// Builds the rejection error for `job` and counts it.
    fn reject(&self, job: &Job) -> PoolError {
        self.counters.tasks_rejected.fetch_add(1, Ordering::Relaxed);
        trace!(task = %job, pool = %self.name, "submission rejected");
        PoolError::Rejected {
            task: job.to_string(),
            pool: self.name.clone(),
        }
    }

    /// Finalizes termination once the last worker is gone and the pool is
    /// hard-stopped. Called with the bookkeeping lock held.
    fn attempt_termination(&self, registry: &Registry) {
        if registry.is_empty() && self.state() == PoolState::ShutDown {
            self.advance_state(PoolState::Terminated);
            self.terminated.notify_all();
        }
    }

    /// Exit callback invoked by every worker on its way out.
    ///
    /// A normal exit of the last worker during teardown advances the pool to
    /// `ShutDown` (the drain is complete) and attempts termination. An abrupt
    /// exit while the pool is `Running` is compensated with a replacement
    /// worker on the same queue; during teardown the death is left alone,
    /// since the pool is going away regardless.
    pub(crate) fn on_worker_exit(core: &Arc<Self>, id: usize, queue_index: usize, abrupt: bool) {
        let mut registry = core.lock_registry();
        core.unregister(&mut registry, id);

        if registry.is_empty() && !abrupt && core.state() >= PoolState::ShuttingDown {
            core.advance_state(PoolState::ShutDown);
            core.attempt_termination(&registry);
        }

        if abrupt && core.state() == PoolState::Running {
            warn!(
                pool = %core.name,
                worker = id,
                queue = queue_index,
                "replacing worker after abrupt exit"
            );
            match worker::spawn_worker(core, queue_index) {
                Ok(replacement) => core.register(&mut registry, replacement),
                Err(e) => {
                    error!(pool = %core.name, queue = queue_index, error = %e,
                        "failed to spawn replacement worker");
                }
            }
        }
    }
}

/// A fixed-parallelism executor that pins each task identity to one worker.
///
/// Submitted [`Job`] handles are routed by identity to one of N bounded
/// queues, each drained by a dedicated worker thread. Repeated submissions of
/// the same handle therefore run on the same thread and, when the pool is
/// built with an [`AffinityThreadFactory`], on the same core.
///
/// # Example
///
/// ```
/// use corebound::{AffinityPool, Job, WaitStrategy};
/// use std::time::Duration;
///
/// let pool = AffinityPool::new("demo", 4, 64, WaitStrategy::Yielding).unwrap();
///
/// let job = Job::new(|| {
///     // short, CPU-bound work
/// });
/// for _ in 0..16 {
///     pool.execute(job.clone()).unwrap();
/// }
///
/// pool.shutdown();
/// assert!(pool.await_termination(Duration::from_secs(5)));
/// ```
pub struct AffinityPool {
    core: Arc<PoolCore>,
}

impl std::fmt::Debug for AffinityPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityPool")
            .field("name", &self.core.name)
            .finish_non_exhaustive()
    }
}

impl AffinityPool {
    /// Creates a pool with `parallelism` workers and queues of capacity
    /// `affinity_group_size`, spawning plain unpinned threads.
    ///
    /// Fails with [`PoolError::InvalidArgument`] when either count is zero.
    pub fn new(
        name: impl Into<String>,
        parallelism: usize,
        affinity_group_size: usize,
        wait_strategy: WaitStrategy,
    ) -> Result<Self> {
        Self::with_factory(
            name,
            parallelism,
            affinity_group_size,
            wait_strategy,
            Arc::new(StdThreadFactory),
        )
    }

    /// Creates a pool from a [`PoolConfig`], computing the worker count from
    /// the machine's cores and pinning workers through an
    /// [`AffinityThreadFactory`] built from the configured strategy list.
    pub fn with_config(config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let factory = AffinityThreadFactory::new(config.cpu_affinity_strategies.clone());
        Self::with_factory(
            config.name.clone(),
            config.parallelism(),
            config.affinity_group_size,
            config.worker_waiting_strategy,
            Arc::new(factory),
        )
    }

    /// Creates a pool spawning its workers through a caller-supplied factory.
    pub fn with_factory(
        name: impl Into<String>,
        parallelism: usize,
        affinity_group_size: usize,
        wait_strategy: WaitStrategy,
        thread_factory: Arc<dyn ThreadFactory>,
    ) -> Result<Self> {
        if parallelism == 0 {
            return Err(PoolError::InvalidArgument(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if affinity_group_size == 0 {
            return Err(PoolError::InvalidArgument(
                "affinity-group-size must be at least 1".to_string(),
            ));
        }

        let core = Arc::new(PoolCore {
            name: name.into(),
            queues: (0..parallelism)
                .map(|_| TaskQueue::with_capacity(affinity_group_size))
                .collect(),
            wait_strategy,
            thread_factory,
            counters: PoolCounters::new(),
            router: Router::new(parallelism),
            state: AtomicU8::new(PoolState::Running.rank()),
            worker_ids: AtomicUsize::new(0),
            registry: Mutex::new(Registry {
                workers: HashMap::with_capacity(parallelism),
            }),
            terminated: Condvar::new(),
        });

        {
            let mut registry = core.lock_registry();
            for queue_index in 0..parallelism {
                match worker::spawn_worker(&core, queue_index) {
                    Ok(w) => core.register(&mut registry, w),
                    Err(e) => {
                        // Tear down the workers we already started before
                        // surfacing the error.
                        core.advance_state(PoolState::ShutDown);
                        for w in registry.workers.values() {
                            w.control().stop();
                        }
                        return Err(e);
                    }
                }
            }
        }

        debug!(pool = %core.name, parallelism, affinity_group_size, "pool started");
        Ok(AffinityPool { core })
    }

    /// Submits a task for execution on its affine worker.
    ///
    /// The path takes no pool lock: a lock-free state read, the routing
    /// lookup, and a bounded queue push. Rejected when the pool is not
    /// [`Running`](PoolState::Running) or the target queue is at capacity.
    pub fn execute(&self, job: Job) -> Result<()> {
        if self.core.state() != PoolState::Running {
            return Err(self.core.reject(&job));
        }
        let queue_index = self.core.router.route(job.key());
        match self.core.queues[queue_index].add(job) {
            Ok(()) => Ok(()),
            Err(job) => Err(self.core.reject(&job)),
        }
    }

    /// Initiates a graceful shutdown: submissions stop, queued work drains.
    ///
    /// Idle workers are signalled to exit; workers with queued or in-flight
    /// tasks keep draining until their queue is empty. Idempotent, and a
    /// no-op after [`shutdown_now`](Self::shutdown_now).
    pub fn shutdown(&self) {
        let registry = self.core.lock_registry();
        if self.core.state() == PoolState::Running {
            self.core.advance_state(PoolState::ShuttingDown);
        }
        for w in registry.workers.values() {
            w.control().stop_if_idle();
        }
        self.core.attempt_termination(&registry);
    }

    /// Hard stop: abandons queued work and signals every worker to exit
    /// after its current task.
    ///
    /// Always returns an empty list; abandoned tasks are not surfaced.
    /// Idempotent.
    pub fn shutdown_now(&self) -> Vec<Job> {
        let registry = self.core.lock_registry();
        self.core.advance_state(PoolState::ShutDown);
        for w in registry.workers.values() {
            w.control().stop();
        }
        self.core.attempt_termination(&registry);
        Vec::new()
    }

    /// Blocks until the pool reaches [`Terminated`](PoolState::Terminated) or
    /// the timeout elapses; returns whether termination was reached.
    ///
    /// `await_termination(Duration::ZERO)` reports the current answer without
    /// waiting.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut registry = self.core.lock_registry();
        while self.core.state() != PoolState::Terminated {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            registry = match self.core.terminated.wait_timeout(registry, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Whether the pool has been hard-stopped.
    ///
    /// True once the state has reached [`ShutDown`](PoolState::ShutDown),
    /// deliberately *not* during the draining
    /// [`ShuttingDown`](PoolState::ShuttingDown) phase, when queued tasks are
    /// still being processed.
    pub fn is_shutdown(&self) -> bool {
        self.core.state() >= PoolState::ShutDown
    }

    /// Whether the pool has fully terminated.
    pub fn is_terminated(&self) -> bool {
        self.core.state() == PoolState::Terminated
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        self.core.state()
    }

    /// The pool's name, as used in worker thread names and rejections.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Number of queues (and of workers while running).
    pub fn parallelism(&self) -> usize {
        self.core.queues.len()
    }

    /// Lock-free activity snapshot.
    pub fn stats(&self) -> PoolStats {
        self.core
            .counters
            .snapshot(self.core.queues.iter().map(|q| q.len()).collect())
    }
}

impl Drop for AffinityPool {
    fn drop(&mut self) {
        // Workers hold the core alive; without this they would spin forever
        // once the facade is gone.
        self.shutdown_now();
    }
}
