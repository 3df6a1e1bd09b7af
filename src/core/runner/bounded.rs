//! Bounded-concurrency runner: fill, drain, decide.
//!
//! The coordinating thread owns the scheduler, the in-flight count, and the
//! stashed decision; worker threads only ever run `execute` and push
//! completions. That confinement is what makes the scheduler and the apply
//! path lock-free: neither is ever called concurrently with itself.
//!
//! # Loop shape
//!
//! 1. **Fill**: submit ready tasks until the in-flight limit is reached or
//!    the scheduler reports something other than a ready task (which gets
//!    stashed, never dropped).
//! 2. **Drain**: poll the completion queue without blocking, at most once per
//!    in-flight task, applying each outcome with a fresh clock reading.
//! 3. **Decide**: pull one decision (stashed first) and either terminate,
//!    wait for a completion, honor a park hint, or stash a ready task that
//!    arrived while capacity was full.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::core::decision::Task;
use crate::core::{Decision, ProcessingEngine, RunnerError, Scheduler};
use crate::infra::completion::{Completion, CompletionQueue, WaitOutcome, WakeHandle};
use crate::infra::worker_pool::WorkerPool;
use crate::util::clock::Clock;

use super::RunReport;

/// Bound a completion wait issued under a `Park(park)` hint.
///
/// The wait must stay shorter than the ceiling so the loop remains responsive
/// even when the scheduler hands out long backoffs; if nothing completes
/// within the clamped window, the runner falls back to sleeping the full hint.
#[must_use]
pub fn clamp_completion_wait(park: Duration, ceiling: Duration) -> Duration {
    park.min(ceiling)
}

/// Runner that drives a worker pool up to a logical in-flight limit.
///
/// Observably equivalent to [`SingleRunner`](super::SingleRunner) — same task,
/// same disposition, same apply call — except that executions overlap in time
/// and completions may be applied out of submission order.
pub struct BoundedRunner<S, C> {
    scheduler: S,
    clock: C,
    pool: WorkerPool,
    config: RunnerConfig,
    wake: WakeHandle,
    wake_rx: Receiver<()>,
}

impl<S: Scheduler, C: Clock> BoundedRunner<S, C> {
    /// Create a runner over the given scheduler, clock, and worker pool.
    ///
    /// A `max_in_flight` below 1 in the config is coerced up to 1 (logged,
    /// non-fatal). The pool's worker count is independent of the in-flight
    /// limit: the limit caps outstanding submissions, not threads.
    pub fn new(scheduler: S, clock: C, pool: WorkerPool, config: RunnerConfig) -> Self {
        if config.max_in_flight < 1 {
            warn!("max_in_flight below 1; coercing to 1");
        }
        let (wake, wake_rx) = WakeHandle::pair();
        Self {
            scheduler,
            clock,
            pool,
            config,
            wake,
            wake_rx,
        }
    }

    /// Handle for nudging the coordinating thread out of a wait or idle park.
    ///
    /// A wake is transient: the runner treats it as "nothing completed right
    /// now" and re-queries the scheduler. To stop the runner, make the
    /// scheduler return `Drained` permanently and let in-flight work finish.
    #[must_use]
    pub fn wake_handle(&self) -> WakeHandle {
        self.wake.clone()
    }

    /// The worker pool this runner submits to.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Drive the scheduler until it is drained and nothing is in flight.
    ///
    /// Blocks the calling thread, which becomes the coordinating thread: the
    /// sole caller of `Scheduler::next_decision` and `ProcessingEngine::apply`
    /// for the duration of the run. `execute` fans out across the worker pool
    /// up to the in-flight limit.
    ///
    /// # Errors
    ///
    /// - [`RunnerError::Execution`] when a drained completion carries an
    ///   execution failure (fail-fast; `apply` is never called for it)
    /// - [`RunnerError::Pool`] when the pool rejects a submission
    pub fn run_until_drained<E: ProcessingEngine>(
        &mut self,
        engine: &Arc<E>,
    ) -> Result<RunReport, RunnerError> {
        let max_in_flight = self.config.effective_max_in_flight();
        let ceiling = self.config.completion_wait_ceiling();
        let max_park = self.config.max_park();
        let completions: CompletionQueue<E::Disposition> =
            CompletionQueue::new(self.wake_rx.clone());

        // Loop state is confined to this thread: plain locals, no sharing.
        let mut in_flight = 0_usize;
        let mut stashed: Option<Decision> = None;
        let mut report = RunReport::default();

        info!(max_in_flight, "bounded runner starting");

        loop {
            debug_assert!(in_flight <= max_in_flight);

            // Fill: submit ready tasks until capacity or a non-ready decision.
            while in_flight < max_in_flight {
                match self.pull(&mut stashed) {
                    Decision::TaskReady(task) => {
                        self.submit_task(engine, &completions, task)?;
                        in_flight += 1;
                        report.submitted += 1;
                    }
                    other => {
                        stashed = Some(other);
                        break;
                    }
                }
            }

            // Drain opportunistically: at most one poll per in-flight task,
            // never blocking.
            let drain_budget = in_flight;
            for _ in 0..drain_budget {
                match completions.poll() {
                    Some(completion) => {
                        self.apply_completion(engine.as_ref(), completion, &mut report)?;
                        in_flight -= 1;
                    }
                    None => break,
                }
            }

            // Decide what to do with the next pull.
            match self.pull(&mut stashed) {
                Decision::Drained => {
                    if in_flight == 0 {
                        break;
                    }
                    // Applying an in-flight completion may feed new work back
                    // into the scheduler, so wait for exactly one, however
                    // long it takes.
                    match completions.wait(None) {
                        WaitOutcome::Completion(completion) => {
                            self.apply_completion(engine.as_ref(), completion, &mut report)?;
                            in_flight -= 1;
                        }
                        WaitOutcome::WokenUp | WaitOutcome::TimedOut => {
                            debug!("wait ended without completion; re-evaluating");
                        }
                    }
                }
                Decision::Park(duration) => {
                    report.parks += 1;
                    // A pathological hint must not wedge the loop; cap every
                    // park sleep at the configured maximum.
                    let park = duration.min(max_park);
                    if in_flight == 0 {
                        debug!(park = ?park, "parking idle");
                        match completions.wait(Some(park)) {
                            // Nothing should be in flight here; if the
                            // assumption is ever violated, apply rather than
                            // drop the completion.
                            WaitOutcome::Completion(completion) => {
                                warn!("completion arrived during idle park");
                                self.apply_completion(engine.as_ref(), completion, &mut report)?;
                                in_flight = in_flight.saturating_sub(1);
                            }
                            WaitOutcome::TimedOut | WaitOutcome::WokenUp => {}
                        }
                    } else {
                        let bound = clamp_completion_wait(park, ceiling);
                        match completions.wait(Some(bound)) {
                            WaitOutcome::Completion(completion) => {
                                self.apply_completion(engine.as_ref(), completion, &mut report)?;
                                in_flight -= 1;
                            }
                            WaitOutcome::TimedOut => {
                                // Nothing imminent; honor the capped hint.
                                debug!(park = ?park, "no completion within bound, sleeping");
                                if !park.is_zero() {
                                    thread::sleep(park);
                                }
                            }
                            WaitOutcome::WokenUp => {
                                debug!("woken during bounded wait; re-evaluating");
                            }
                        }
                    }
                }
                decision @ Decision::TaskReady(_) => {
                    // Capacity was full when this was pulled (fill only stops
                    // with an empty stash once in_flight == max_in_flight, so
                    // something is running). Hold the decision for the next
                    // fill phase and wait for capacity instead of spinning.
                    stashed = Some(decision);
                    match completions.wait(Some(ceiling)) {
                        WaitOutcome::Completion(completion) => {
                            self.apply_completion(engine.as_ref(), completion, &mut report)?;
                            in_flight -= 1;
                        }
                        WaitOutcome::TimedOut | WaitOutcome::WokenUp => {}
                    }
                }
            }
        }

        info!(
            submitted = report.submitted,
            applied = report.applied,
            parks = report.parks,
            "bounded runner drained"
        );
        Ok(report)
    }

    /// Consume the stashed decision if present, otherwise pull a fresh one.
    ///
    /// The stash is consulted first so the scheduler is never asked for a new
    /// decision while one is pending, and no decision is ever dropped.
    fn pull(&mut self, stashed: &mut Option<Decision>) -> Decision {
        stashed
            .take()
            .unwrap_or_else(|| self.scheduler.next_decision())
    }

    /// Hand one task to the worker pool.
    fn submit_task<E: ProcessingEngine>(
        &self,
        engine: &Arc<E>,
        completions: &CompletionQueue<E::Disposition>,
        task: Task,
    ) -> Result<(), RunnerError> {
        debug!(url = %task.url, trace = %task.trace_id, attempt = task.attempt, "submitting task");
        let engine = Arc::clone(engine);
        let sender = completions.sender();
        self.pool.submit(Box::new(move || {
            // A panic on a worker must not strand the coordinator waiting on
            // a completion that will never come; convert it to a failure.
            let outcome = catch_unwind(AssertUnwindSafe(|| engine.execute(&task)))
                .unwrap_or_else(|_| Err(anyhow!("task execution panicked")));
            sender.send(Completion { task, outcome });
        }))?;
        Ok(())
    }

    /// Apply one drained completion, or surface its execution failure.
    fn apply_completion<E: ProcessingEngine>(
        &self,
        engine: &E,
        completion: Completion<E::Disposition>,
        report: &mut RunReport,
    ) -> Result<(), RunnerError> {
        let Completion { task, outcome } = completion;
        match outcome {
            Ok(disposition) => {
                engine.apply(&task, disposition, self.clock.now_ms());
                report.applied += 1;
                debug!(url = %task.url, trace = %task.trace_id, "applied completion");
                Ok(())
            }
            Err(source) => {
                warn!(url = %task.url, trace = %task.trace_id, "task execution failed");
                Err(RunnerError::Execution {
                    url: task.url,
                    trace_id: task.trace_id,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_uses_park_when_short() {
        let bound = clamp_completion_wait(Duration::from_millis(50), Duration::from_millis(500));
        assert_eq!(bound, Duration::from_millis(50));
    }

    #[test]
    fn test_clamp_caps_long_park_at_ceiling() {
        let bound = clamp_completion_wait(Duration::from_secs(30), Duration::from_millis(500));
        assert_eq!(bound, Duration::from_millis(500));
    }

    #[test]
    fn test_clamp_zero_park_is_zero() {
        let bound = clamp_completion_wait(Duration::ZERO, Duration::from_millis(500));
        assert_eq!(bound, Duration::ZERO);
    }
}
