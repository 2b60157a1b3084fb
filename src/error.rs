//! Error types for pool construction and task submission.

use thiserror::Error;

/// Errors surfaced by the affinity pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Invalid construction or configuration input: zero parallelism, zero
    /// group size, or an unrecognized strategy token.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A submission was refused, either because the pool is no longer
    /// running or because the task's queue is at capacity.
    #[error("task {task} rejected from pool {pool}")]
    Rejected {
        /// Stringified identity of the rejected task handle.
        task: String,
        /// Name of the rejecting pool.
        pool: String,
    },

    /// The thread factory failed to produce a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_names_task_and_pool() {
        let err = PoolError::Rejected {
            task: "Job@0x1000".to_string(),
            pool: "render".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Job@0x1000"));
        assert!(msg.contains("render"));
    }

    #[test]
    fn test_invalid_argument_message() {
        let err = PoolError::InvalidArgument("parallelism must be at least 1".to_string());
        assert!(err.to_string().contains("parallelism"));
    }
}
