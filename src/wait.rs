//! Idle back-off strategies for workers.
//!
//! A worker invokes its pool's strategy once per empty poll, in a tight loop.
//! The call never blocks on pool state and never panics; it only decides how
//! aggressively the worker burns CPU while waiting for work.

use std::str::FromStr;
use std::thread;
use std::time::Duration;

use crate::error::PoolError;

/// Back-off applied between empty queue polls.
///
/// Chosen at pool construction and invariant for the pool's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Spin without descheduling. Lowest wakeup latency, a full core per
    /// idle worker.
    BusySpin,
    /// Hint the scheduler to deschedule the current thread briefly.
    Yielding,
    /// Sleep for the smallest interval the platform supports (~1 ns
    /// requested; the OS rounds up to its timer granularity).
    Parking,
}

impl WaitStrategy {
    /// Performs one back-off step.
    pub fn idle(&self) {
        match self {
            WaitStrategy::BusySpin => std::hint::spin_loop(),
            WaitStrategy::Yielding => thread::yield_now(),
            WaitStrategy::Parking => thread::sleep(Duration::from_nanos(1)),
        }
    }

    /// The configuration token naming this strategy.
    pub fn token(&self) -> &'static str {
        match self {
            WaitStrategy::BusySpin => "busy-spin",
            WaitStrategy::Yielding => "yield",
            WaitStrategy::Parking => "sleep",
        }
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Parking
    }
}

impl FromStr for WaitStrategy {
    type Err = PoolError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "busy-spin" => Ok(WaitStrategy::BusySpin),
            "yield" => Ok(WaitStrategy::Yielding),
            "sleep" => Ok(WaitStrategy::Parking),
            other => Err(PoolError::InvalidArgument(format!(
                "unknown worker-waiting-strategy `{other}` (expected sleep, yield or busy-spin)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip() {
        for strategy in [
            WaitStrategy::BusySpin,
            WaitStrategy::Yielding,
            WaitStrategy::Parking,
        ] {
            assert_eq!(strategy.token().parse::<WaitStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_unknown_token_is_invalid_argument() {
        let err = "spin-wait".parse::<WaitStrategy>().unwrap_err();
        assert!(matches!(err, PoolError::InvalidArgument(_)));
    }

    #[test]
    fn test_idle_returns() {
        // Each strategy must return promptly; this is a liveness smoke test.
        WaitStrategy::BusySpin.idle();
        WaitStrategy::Yielding.idle();
        WaitStrategy::Parking.idle();
    }
}
