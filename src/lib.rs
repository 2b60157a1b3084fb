//! # Corebound - Affinity-Based Task Executor
//!
//! A fixed-parallelism worker pool that pins each submitted task identity to
//! one of N bounded single-consumer queues, each drained by a dedicated
//! worker thread. Repeated submissions of the same task therefore run on the
//! same worker (and, combined with CPU pinning, on the same core), which
//! maximizes cache locality for short, CPU-bound work.
//!
//! ## Architecture
//!
//! Submissions flow through a lock-free path: the pool reads its state,
//! consults the router for the task's sticky queue index, and pushes into
//! that bounded queue. Key components:
//!
//! - **Jobs**: clonable task handles whose identity drives routing
//! - **Task Queues**: fixed-capacity FIFOs, one consumer worker each
//! - **Router**: sticky identity-to-queue mapping, round-robin seeded
//! - **Workers**: OS threads draining one queue each, with an idle
//!   [`WaitStrategy`] and panic-driven replacement
//! - **Pool**: the lifecycle state machine
//!   (Running → ShuttingDown → ShutDown → Terminated)
//!
//! ## Example
//!
//! ```no_run
//! use corebound::{AffinityPool, Job, WaitStrategy};
//! use std::time::Duration;
//!
//! let pool = AffinityPool::new("example", 4, 64, WaitStrategy::Parking).unwrap();
//!
//! // All submissions of this handle run on the same worker thread.
//! let job = Job::new(|| {
//!     println!("hello from an affine worker");
//! });
//! pool.execute(job.clone()).unwrap();
//! pool.execute(job).unwrap();
//!
//! pool.shutdown();
//! assert!(pool.await_termination(Duration::from_secs(5)));
//! ```

pub mod config;
pub mod error;
pub mod pinning;
pub mod pool;
pub mod queue;
pub mod router;
pub mod stats;
pub mod task;
pub mod wait;
pub mod worker;

pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use pinning::{AffinityStrategy, AffinityThreadFactory, CpuTopology, StdThreadFactory, ThreadFactory};
pub use pool::{AffinityPool, PoolState};
pub use queue::TaskQueue;
pub use router::Router;
pub use stats::PoolStats;
pub use task::{Job, TaskKey};
pub use wait::WaitStrategy;
pub use worker::WorkerState;
