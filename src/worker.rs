//! Worker threads.
//!
//! Each worker exclusively owns the consumer end of one task queue and drains
//! it until the pool tells it to stop. Workers report their own exit back to
//! the pool, distinguishing a normal loop exit from an abrupt one (a task
//! panic unwinding through the loop), which drives worker replacement.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::Result;
use crate::pool::{PoolCore, PoolState};

/// Observable lifecycle of a single worker.
///
/// `NotStarted` is left exactly once, when the worker thread enters its loop;
/// afterwards the state oscillates between `Idle` and `InExecution`. The
/// worker thread is the sole writer; shutdown paths tolerate a stale read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    NotStarted = 0,
    Idle = 1,
    InExecution = 2,
}

impl WorkerState {
    fn from_rank(rank: u8) -> WorkerState {
        match rank {
            0 => WorkerState::NotStarted,
            1 => WorkerState::Idle,
            _ => WorkerState::InExecution,
        }
    }
}

/// Control block shared between a worker's thread and the pool registry.
pub(crate) struct WorkerControl {
    state: AtomicU8,
    interrupted: AtomicBool,
    started: AtomicBool,
}

impl WorkerControl {
    fn new() -> Self {
        WorkerControl {
            state: AtomicU8::new(WorkerState::NotStarted as u8),
            interrupted: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_rank(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Requests the worker to stop at its next loop check.
    ///
    /// An idle worker observes the flag on its next iteration; a worker in
    /// execution finishes its current task first. The wait strategies do not
    /// check the flag, so this never interrupts a task mid-flight.
    pub(crate) fn stop(&self) {
        if self.started.load(Ordering::Acquire) {
            self.interrupted.store(true, Ordering::Release);
        }
    }

    /// Like [`stop`](Self::stop), but only if the worker is idle at the
    /// instant of the check.
    pub(crate) fn stop_if_idle(&self) {
        if self.state() == WorkerState::Idle {
            self.stop();
        }
    }

    /// Atomically checks and clears the interrupt flag.
    fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::AcqRel)
    }
}

/// Registry entry for a spawned worker.
pub(crate) struct Worker {
    id: usize,
    control: Arc<WorkerControl>,
    _handle: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn control(&self) -> &WorkerControl {
        &self.control
    }
}

/// Spawns a worker draining `queues[queue_index]` through the pool's thread
/// factory. Called with the bookkeeping lock held, so the worker's own exit
/// callback cannot run before the caller has registered it.
pub(crate) fn spawn_worker(core: &Arc<PoolCore>, queue_index: usize) -> Result<Worker> {
    let id = core.next_worker_id();
    let control = Arc::new(WorkerControl::new());

    let thread_core = Arc::clone(core);
    let thread_control = Arc::clone(&control);
    let name = format!("{}-worker-{}", core.name, id);
    let handle = core.thread_factory.new_thread(
        name,
        Box::new(move || run(thread_core, thread_control, id, queue_index)),
    )?;
    control.mark_started();
    debug!(worker = id, queue = queue_index, "spawned worker");

    Ok(Worker {
        id,
        control,
        _handle: handle,
    })
}

/// Restores `Idle` when the execution scope ends, panic or not.
struct ExecutionScope<'a> {
    control: &'a WorkerControl,
}

impl<'a> ExecutionScope<'a> {
    fn enter(control: &'a WorkerControl) -> Self {
        control.set_state(WorkerState::InExecution);
        ExecutionScope { control }
    }
}

impl Drop for ExecutionScope<'_> {
    fn drop(&mut self) {
        self.control.set_state(WorkerState::Idle);
    }
}

/// Delivers the exit callback on every path out of the worker loop,
/// including panic unwinds. `abrupt` stays true unless the loop exits
/// normally.
struct ExitGuard {
    core: Arc<PoolCore>,
    control: Arc<WorkerControl>,
    id: usize,
    queue_index: usize,
    abrupt: bool,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if self.abrupt {
            warn!(
                worker = self.id,
                queue = self.queue_index,
                "worker exited abruptly"
            );
        } else {
            debug!(worker = self.id, "worker exited");
        }
        PoolCore::on_worker_exit(&self.core, self.id, self.queue_index, self.abrupt);
    }
}

/// The worker main loop.
fn run(core: Arc<PoolCore>, control: Arc<WorkerControl>, id: usize, queue_index: usize) {
    control.set_state(WorkerState::Idle);
    let mut exit = ExitGuard {
        core,
        control,
        id,
        queue_index,
        abrupt: true,
    };

    while should_keep_running(&exit) {
        match exit.core.queues[queue_index].poll() {
            Some(job) => {
                let _scope = ExecutionScope::enter(&exit.control);
                job.run();
                exit.core
                    .counters
                    .tasks_executed
                    .fetch_add(1, Ordering::Relaxed);
            }
            None => exit.core.wait_strategy.idle(),
        }
    }

    exit.abrupt = false;
}

/// Loop condition, evaluated once per iteration:
/// 1. below ShuttingDown, or still draining a non-empty queue;
/// 2. not interrupted (the check clears the flag);
/// 3. not hard-stopped (ShutDown discards queued work).
fn should_keep_running(exit: &ExitGuard) -> bool {
    let state = exit.core.state();
    (state < PoolState::ShuttingDown || !exit.core.queues[exit.queue_index].is_empty())
        && !exit.control.take_interrupt()
        && state < PoolState::ShutDown
}
