//! Pool sizing and strategy configuration.
//!
//! Mirrors the knobs an external configuration loader hands to the pool:
//! a parallelism window (`min`/`factor`/`max`), the per-queue capacity, an
//! ordered list of CPU affinity strategies, and the worker waiting strategy.
//! Token parsing lives on the strategy enums themselves; this module wires
//! tokens into a validated config.

use std::thread;

use crate::error::{PoolError, Result};
use crate::pinning::AffinityStrategy;
use crate::wait::WaitStrategy;

/// Configuration for an [`AffinityPool`](crate::AffinityPool).
///
/// `parallelism()` computes the worker count as
/// `clamp(ceil(cores * parallelism_factor), parallelism_min, parallelism_max)`.
/// A power-of-two result lets the router use its mask path; other values fall
/// back to modular reduction.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pool name; also the worker thread name prefix.
    pub name: String,
    /// Lower bound on the computed worker count.
    pub parallelism_min: usize,
    /// Multiplier applied to the number of available cores.
    pub parallelism_factor: f64,
    /// Upper bound on the computed worker count.
    pub parallelism_max: usize,
    /// Capacity of each worker's task queue.
    pub affinity_group_size: usize,
    /// Ordered placement preferences handed to the thread factory.
    pub cpu_affinity_strategies: Vec<AffinityStrategy>,
    /// Idle back-off used by every worker.
    pub worker_waiting_strategy: WaitStrategy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            name: "corebound".to_string(),
            parallelism_min: 4,
            parallelism_factor: 0.8,
            parallelism_max: 64,
            affinity_group_size: 256,
            cpu_affinity_strategies: vec![AffinityStrategy::Any],
            worker_waiting_strategy: WaitStrategy::default(),
        }
    }
}

impl PoolConfig {
    /// Default configuration under a custom pool name.
    pub fn named(name: impl Into<String>) -> Self {
        PoolConfig {
            name: name.into(),
            ..PoolConfig::default()
        }
    }

    /// Replaces the affinity strategy list from configuration tokens.
    ///
    /// Recognized tokens: `any`, `same-core`, `same-socket`, `different-core`,
    /// `different-socket`. Anything else fails with
    /// [`PoolError::InvalidArgument`].
    pub fn cpu_affinity_from_tokens(mut self, tokens: &[&str]) -> Result<Self> {
        self.cpu_affinity_strategies = tokens
            .iter()
            .map(|t| t.parse::<AffinityStrategy>())
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    /// Replaces the waiting strategy from its configuration token
    /// (`sleep`, `yield` or `busy-spin`).
    pub fn waiting_strategy_from_token(mut self, token: &str) -> Result<Self> {
        self.worker_waiting_strategy = token.parse()?;
        Ok(self)
    }

    /// Computes the worker count for this machine.
    pub fn parallelism(&self) -> usize {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let scaled = (cores as f64 * self.parallelism_factor).ceil() as usize;
        scaled.clamp(self.parallelism_min, self.parallelism_max)
    }

    /// Checks the sizing window and group size.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism_min == 0 {
            return Err(PoolError::InvalidArgument(
                "parallelism-min must be at least 1".to_string(),
            ));
        }
        if self.parallelism_max < self.parallelism_min {
            return Err(PoolError::InvalidArgument(format!(
                "parallelism-max {} is below parallelism-min {}",
                self.parallelism_max, self.parallelism_min
            )));
        }
        if !(self.parallelism_factor.is_finite() && self.parallelism_factor > 0.0) {
            return Err(PoolError::InvalidArgument(format!(
                "parallelism-factor {} must be a positive number",
                self.parallelism_factor
            )));
        }
        if self.affinity_group_size == 0 {
            return Err(PoolError::InvalidArgument(
                "affinity-group-size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
