//! Infrastructure adapters: worker pool and completion transport.

pub mod completion;
pub mod worker_pool;

pub use completion::{Completion, CompletionQueue, CompletionSender, WaitOutcome, WakeHandle};
pub use worker_pool::{Job, PoolError, PoolStats, WorkerPool};
