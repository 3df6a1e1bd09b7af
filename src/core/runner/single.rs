//! Single-threaded runner: the reference drive loop.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::core::{Decision, ProcessingEngine, RunnerError, Scheduler};
use crate::util::clock::Clock;

use super::RunReport;

/// Default cap on how long one park hint may put the loop to sleep.
const DEFAULT_MAX_PARK: Duration = Duration::from_secs(10);

/// Synchronous drive loop: one task at a time, applied immediately.
///
/// This is the reference semantics the bounded runner stays observably
/// equivalent to (same task, same disposition, same apply call), only
/// executed out of order and overlapped in time.
pub struct SingleRunner<S, C> {
    scheduler: S,
    clock: C,
    max_park: Duration,
}

impl<S: Scheduler, C: Clock> SingleRunner<S, C> {
    /// Create a runner over the given scheduler and clock.
    pub fn new(scheduler: S, clock: C) -> Self {
        Self {
            scheduler,
            clock,
            max_park: DEFAULT_MAX_PARK,
        }
    }

    /// Cap park sleeps at `max_park` instead of the default 10s.
    #[must_use]
    pub const fn with_max_park(mut self, max_park: Duration) -> Self {
        self.max_park = max_park;
        self
    }

    /// Drive the scheduler until it reports `Drained`.
    ///
    /// Blocks the calling thread. Each ready task is executed synchronously
    /// and its outcome applied with the current clock reading before the
    /// scheduler is asked again.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Execution`] as soon as any task's `execute`
    /// fails; `apply` is not called for the failed task.
    pub fn run_until_drained<E: ProcessingEngine>(
        &mut self,
        engine: &E,
    ) -> Result<RunReport, RunnerError> {
        let mut report = RunReport::default();

        loop {
            match self.scheduler.next_decision() {
                Decision::TaskReady(task) => {
                    debug!(url = %task.url, trace = %task.trace_id, attempt = task.attempt, "executing task");
                    report.submitted += 1;
                    let disposition =
                        engine
                            .execute(&task)
                            .map_err(|source| RunnerError::Execution {
                                url: task.url.clone(),
                                trace_id: task.trace_id,
                                source,
                            })?;
                    engine.apply(&task, disposition, self.clock.now_ms());
                    report.applied += 1;
                }
                Decision::Park(duration) => {
                    report.parks += 1;
                    let bounded = duration.min(self.max_park);
                    debug!(park = ?bounded, "parking");
                    if !bounded.is_zero() {
                        thread::sleep(bounded);
                    }
                }
                Decision::Drained => break,
            }
        }

        info!(
            submitted = report.submitted,
            applied = report.applied,
            "single runner drained"
        );
        Ok(report)
    }
}
