//! Error types for runner operations.

use thiserror::Error;
use uuid::Uuid;

use crate::infra::worker_pool::PoolError;

/// Errors that terminate a runner loop.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A task's `execute` failed. Surfaced when its completion is drained;
    /// the runner does not retry (retries are a scheduler policy concern).
    #[error("task execution failed for {url} (trace {trace_id}): {source}")]
    Execution {
        /// Identity of the failed task.
        url: String,
        /// Trace token of the failed task.
        trace_id: Uuid,
        /// Underlying failure from the engine.
        #[source]
        source: anyhow::Error,
    },
    /// The worker pool rejected a submission or is gone.
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
