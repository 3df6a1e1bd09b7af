//! Runner strategies consuming the scheduler decision protocol.

pub mod bounded;
pub mod single;

pub use bounded::{clamp_completion_wait, BoundedRunner};
pub use single::SingleRunner;

/// Statistics from one `run_until_drained` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunReport {
    /// Tasks handed to execution.
    pub submitted: u64,
    /// Completions applied back to the engine.
    pub applied: u64,
    /// Park hints honored.
    pub parks: u64,
}
