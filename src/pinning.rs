//! CPU affinity strategies and the worker thread factory.
//!
//! The pool itself never pins anything; it asks a [`ThreadFactory`] for each
//! worker thread and treats the factory as opaque. [`AffinityThreadFactory`]
//! is the pinning implementation: it estimates the machine's socket layout,
//! assigns each spawned thread a core honoring an ordered list of
//! [`AffinityStrategy`] preferences, and pins inside the new thread with
//! `core_affinity`. Pinning failures are logged and never fatal.

use std::collections::HashMap;
use std::io;
use std::str::FromStr;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use core_affinity::CoreId;
use tracing::{debug, warn};

use crate::error::PoolError;

/// Placement preference for a worker thread relative to the cores already
/// handed out by the same factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinityStrategy {
    /// No preference; cores are handed out round-robin.
    Any,
    /// Co-locate with the first pinned worker's core.
    SameCore,
    /// Stay on the first pinned worker's socket.
    SameSocket,
    /// Take a core no other worker from this factory occupies.
    DifferentCore,
    /// Leave the first pinned worker's socket.
    DifferentSocket,
}

impl AffinityStrategy {
    /// The configuration token naming this strategy.
    pub fn token(&self) -> &'static str {
        match self {
            AffinityStrategy::Any => "any",
            AffinityStrategy::SameCore => "same-core",
            AffinityStrategy::SameSocket => "same-socket",
            AffinityStrategy::DifferentCore => "different-core",
            AffinityStrategy::DifferentSocket => "different-socket",
        }
    }
}

impl FromStr for AffinityStrategy {
    type Err = PoolError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "any" => Ok(AffinityStrategy::Any),
            "same-core" => Ok(AffinityStrategy::SameCore),
            "same-socket" => Ok(AffinityStrategy::SameSocket),
            "different-core" => Ok(AffinityStrategy::DifferentCore),
            "different-socket" => Ok(AffinityStrategy::DifferentSocket),
            other => Err(PoolError::InvalidArgument(format!(
                "unknown cpu-affinity strategy `{other}`"
            ))),
        }
    }
}

/// Estimated socket layout of the machine.
///
/// Socket boundaries are not reliably exposed cross-platform, so detection is
/// conservative: single socket unless the core count gives strong evidence of
/// more, in which case cores are split evenly. A wrong guess degrades pinning
/// quality, never correctness.
#[derive(Debug, Clone)]
pub struct CpuTopology {
    core_to_socket: HashMap<usize, usize>,
    socket_cores: HashMap<usize, Vec<usize>>,
    num_sockets: usize,
}

impl CpuTopology {
    /// Detects the topology of the current machine.
    pub fn detect() -> Self {
        use sysinfo::{CpuRefreshKind, System};

        let mut system = System::new();
        system.refresh_cpu_specifics(CpuRefreshKind::everything());
        Self::from_core_count(system.cpus().len().max(1))
    }

    /// Builds an estimated topology over `num_cores` logical cores.
    pub fn from_core_count(num_cores: usize) -> Self {
        // Boxes with more than 32 logical cores are plausibly multi-socket;
        // cap the estimate at 2 since we cannot verify further.
        let num_sockets = if num_cores > 32 { 2 } else { 1 };

        let mut core_to_socket = HashMap::new();
        let mut socket_cores: HashMap<usize, Vec<usize>> = HashMap::new();
        let per_socket = num_cores.div_ceil(num_sockets);

        for core in 0..num_cores {
            let socket = core / per_socket;
            core_to_socket.insert(core, socket);
            socket_cores.entry(socket).or_default().push(core);
        }

        CpuTopology {
            core_to_socket,
            socket_cores,
            num_sockets,
        }
    }

    /// Socket an estimated core belongs to.
    pub fn socket_of(&self, core: usize) -> Option<usize> {
        self.core_to_socket.get(&core).copied()
    }

    /// Estimated cores on a socket.
    pub fn cores_on(&self, socket: usize) -> Option<&Vec<usize>> {
        self.socket_cores.get(&socket)
    }

    /// Number of estimated sockets.
    pub fn num_sockets(&self) -> usize {
        self.num_sockets
    }
}

/// Capability that produces the OS threads running worker loops.
///
/// The pool calls `new_thread` once per worker and once per replacement after
/// an abrupt exit; everything about placement is the factory's business.
pub trait ThreadFactory: Send + Sync + 'static {
    /// Spawns a named thread executing `body`.
    fn new_thread(
        &self,
        name: String,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>>;
}

/// Plain `thread::Builder` factory with no pinning.
pub struct StdThreadFactory;

impl ThreadFactory for StdThreadFactory {
    fn new_thread(
        &self,
        name: String,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name(name).spawn(body)
    }
}

/// Factory that pins each spawned thread to a core chosen by an ordered list
/// of strategies.
///
/// Strategies are tried in order against the cores this factory has already
/// handed out; the first one that can be satisfied decides the core. With no
/// prior assignment every strategy degrades to round-robin.
pub struct AffinityThreadFactory {
    strategies: Vec<AffinityStrategy>,
    topology: CpuTopology,
    cores: Vec<CoreId>,
    assigned: Mutex<Vec<usize>>,
}

impl AffinityThreadFactory {
    /// Builds a factory over the machine's visible cores.
    pub fn new(strategies: Vec<AffinityStrategy>) -> Self {
        let cores = core_affinity::get_core_ids().unwrap_or_default();
        let topology = CpuTopology::from_core_count(cores.len().max(1));
        AffinityThreadFactory {
            strategies,
            topology,
            cores,
            assigned: Mutex::new(Vec::new()),
        }
    }

    /// Picks the next core to pin, or `None` when no cores are visible.
    fn pick_core(&self) -> Option<CoreId> {
        if self.cores.is_empty() {
            return None;
        }
        let mut assigned = match self.assigned.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let position = self.choose_position(&assigned);
        assigned.push(position);
        Some(self.cores[position])
    }

    /// Index into `self.cores` honoring the first satisfiable strategy.
    fn choose_position(&self, assigned: &[usize]) -> usize {
        let round_robin = assigned.len() % self.cores.len();
        let anchor = match assigned.first() {
            Some(&first) => first,
            // First worker: nothing to be relative to yet.
            None => return round_robin,
        };
        let anchor_socket = self.topology.socket_of(anchor);

        for strategy in &self.strategies {
            let candidate = match strategy {
                AffinityStrategy::Any => Some(round_robin),
                AffinityStrategy::SameCore => Some(anchor),
                AffinityStrategy::SameSocket => (0..self.cores.len())
                    .find(|&c| self.topology.socket_of(c) == anchor_socket && !assigned.contains(&c))
                    .or(Some(anchor)),
                AffinityStrategy::DifferentCore => {
                    (0..self.cores.len()).find(|c| !assigned.contains(c))
                }
                AffinityStrategy::DifferentSocket => (0..self.cores.len())
                    .find(|&c| self.topology.socket_of(c) != anchor_socket),
            };
            if let Some(position) = candidate {
                return position;
            }
        }
        round_robin
    }
}

impl ThreadFactory for AffinityThreadFactory {
    fn new_thread(
        &self,
        name: String,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        let core_id = self.pick_core();
        thread::Builder::new().name(name.clone()).spawn(move || {
            if let Some(core) = core_id {
                if core_affinity::set_for_current(core) {
                    debug!(thread = %name, core = core.id, "pinned worker thread");
                } else {
                    warn!(thread = %name, core = core.id, "failed to pin worker thread");
                }
            }
            body();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_tokens_round_trip() {
        for strategy in [
            AffinityStrategy::Any,
            AffinityStrategy::SameCore,
            AffinityStrategy::SameSocket,
            AffinityStrategy::DifferentCore,
            AffinityStrategy::DifferentSocket,
        ] {
            assert_eq!(
                strategy.token().parse::<AffinityStrategy>().unwrap(),
                strategy
            );
        }
    }

    #[test]
    fn test_unknown_strategy_token_is_rejected() {
        let err = "same-numa".parse::<AffinityStrategy>().unwrap_err();
        assert!(matches!(err, PoolError::InvalidArgument(_)));
    }

    #[test]
    fn test_small_machines_estimate_one_socket() {
        let topology = CpuTopology::from_core_count(8);
        assert_eq!(topology.num_sockets(), 1);
        assert_eq!(topology.socket_of(0), topology.socket_of(7));
    }

    #[test]
    fn test_large_machines_split_sockets_evenly() {
        let topology = CpuTopology::from_core_count(64);
        assert_eq!(topology.num_sockets(), 2);
        assert_eq!(topology.socket_of(0), Some(0));
        assert_eq!(topology.socket_of(63), Some(1));
        assert_eq!(topology.cores_on(0).unwrap().len(), 32);
    }

    #[test]
    fn test_std_factory_spawns_named_thread() {
        let factory = StdThreadFactory;
        let handle = factory
            .new_thread(
                "factory-test".to_string(),
                Box::new(|| {
                    assert_eq!(thread::current().name(), Some("factory-test"));
                }),
            )
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_affinity_factory_runs_body_without_cores() {
        // Even when pinning is unavailable the body must still run.
        let factory = AffinityThreadFactory::new(vec![AffinityStrategy::Any]);
        let handle = factory
            .new_thread("pin-test".to_string(), Box::new(|| {}))
            .unwrap();
        handle.join().unwrap();
    }
}
