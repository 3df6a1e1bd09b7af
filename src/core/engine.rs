//! Processing engine contract: task execution and outcome application.

use super::{AppResult, Task};

/// Executes tasks and applies their outcomes.
///
/// The two operations have very different threading contracts:
///
/// - [`execute`](Self::execute) may be long-running (network I/O) and may be
///   called concurrently from worker-pool threads, up to the runner's
///   in-flight limit. It must not touch scheduler state.
/// - [`apply`](Self::apply) is the only place where outcomes feed back into
///   scheduler/engine state (enqueue follow-ups, mark a host rate-limited,
///   record metrics). It is called exactly once per executed task, only from
///   the coordinating thread, never concurrently with itself. Apply order
///   across different tasks need not match submission order.
///
/// # Example
///
/// ```rust,ignore
/// use frontier_runner::core::{AppResult, ProcessingEngine, Task};
///
/// struct FetchEngine { frontier: Arc<Mutex<Frontier>> }
///
/// impl ProcessingEngine for FetchEngine {
///     type Disposition = FetchOutcome;
///
///     fn execute(&self, task: &Task) -> AppResult<FetchOutcome> {
///         fetch(&task.url) // network call, runs on a worker thread
///     }
///
///     fn apply(&self, task: &Task, outcome: FetchOutcome, completed_at_ms: u128) {
///         self.frontier.lock().record(task, outcome, completed_at_ms);
///     }
/// }
/// ```
pub trait ProcessingEngine: Send + Sync + 'static {
    /// Outcome classification of having executed a task. Opaque to the
    /// runner: produced by `execute`, consumed only by `apply`.
    type Disposition: Send + 'static;

    /// Run the task to a disposition. An `Err` here is an execution failure;
    /// the runner propagates it fail-fast and never calls `apply` for the
    /// failed task. Retry, if any, is a scheduler policy concern.
    fn execute(&self, task: &Task) -> AppResult<Self::Disposition>;

    /// Feed a completed task's outcome back into engine/scheduler state.
    /// `completed_at_ms` is taken from the runner's clock at drain time.
    fn apply(&self, task: &Task, disposition: Self::Disposition, completed_at_ms: u128);
}
