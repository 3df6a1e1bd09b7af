//! Integration tests for the bounded-concurrency runner.
//!
//! These tests validate the decision protocol end to end:
//! - In-flight accounting stays within the configured limit
//! - No decision is ever lost; ready tasks are submitted in retrieval order
//! - Termination only once drained with nothing in flight
//! - Park hints are honored without busy-spinning
//! - Execution failures propagate fail-fast, without an apply
//! - Completions applied after a drain can feed new work back in

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use parking_lot::Mutex;

use frontier_runner::config::{RunnerConfig, WorkerPoolConfig};
use frontier_runner::core::{
    AppResult, BoundedRunner, Decision, ProcessingEngine, RunnerError, Scheduler, Task,
};
use frontier_runner::infra::{PoolError, WorkerPool};
use frontier_runner::util::{ManualClock, SystemClock};

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// Scheduler that replays a fixed script, then reports `Drained` forever.
struct ScriptedScheduler {
    script: VecDeque<Decision>,
    pulls: Arc<AtomicUsize>,
}

impl ScriptedScheduler {
    fn new(script: Vec<Decision>) -> Self {
        Self {
            script: script.into(),
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn pull_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulls)
    }
}

impl Scheduler for ScriptedScheduler {
    fn next_decision(&mut self) -> Decision {
        self.pulls.fetch_add(1, Ordering::Relaxed);
        self.script.pop_front().unwrap_or(Decision::Drained)
    }
}

/// Scheduler over a shared deque so an engine's `apply` can enqueue
/// follow-up work mid-run.
struct SharedScheduler {
    frontier: Arc<Mutex<VecDeque<Decision>>>,
}

impl Scheduler for SharedScheduler {
    fn next_decision(&mut self) -> Decision {
        self.frontier.lock().pop_front().unwrap_or(Decision::Drained)
    }
}

/// Engine that records execution/apply events and tracks concurrent
/// executions with a high-water mark.
#[derive(Default)]
struct RecordingEngine {
    events: Mutex<Vec<String>>,
    applied: Mutex<Vec<(String, String, u128)>>,
    executing: AtomicUsize,
    max_executing: AtomicUsize,
    exec_seq: AtomicUsize,
    execute_delay: Duration,
    fail_urls: Vec<String>,
    /// When set, the first `Barrier`-party executions rendezvous here.
    overlap_barrier: Option<Arc<Barrier>>,
    /// Follow-up decisions pushed on apply of the matching url.
    follow_ups: Mutex<Vec<(String, Decision)>>,
    frontier: Option<Arc<Mutex<VecDeque<Decision>>>>,
}

impl RecordingEngine {
    fn with_delay(delay: Duration) -> Self {
        Self {
            execute_delay: delay,
            ..Self::default()
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn applied(&self) -> Vec<(String, String, u128)> {
        self.applied.lock().clone()
    }

    fn apply_count(&self, url: &str) -> usize {
        self.applied.lock().iter().filter(|(u, _, _)| u == url).count()
    }
}

impl ProcessingEngine for RecordingEngine {
    type Disposition = String;

    fn execute(&self, task: &Task) -> AppResult<String> {
        let current = self.executing.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_executing.fetch_max(current, Ordering::SeqCst);
        self.events.lock().push(format!("exec:{}", task.url));

        // Only the first two executions rendezvous; later ones would block
        // forever on a two-party barrier.
        let seq = self.exec_seq.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.overlap_barrier {
            if seq < 2 {
                barrier.wait();
            }
        }
        if !self.execute_delay.is_zero() {
            std::thread::sleep(self.execute_delay);
        }

        self.executing.fetch_sub(1, Ordering::SeqCst);
        if self.fail_urls.contains(&task.url) {
            return Err(anyhow!("simulated fetch failure"));
        }
        Ok(format!("fetched:{}", task.url))
    }

    fn apply(&self, task: &Task, disposition: String, completed_at_ms: u128) {
        self.events.lock().push(format!("apply:{}", task.url));
        self.applied
            .lock()
            .push((task.url.clone(), disposition, completed_at_ms));

        if let Some(frontier) = &self.frontier {
            let mut follow_ups = self.follow_ups.lock();
            let mut kept = Vec::new();
            for (url, decision) in follow_ups.drain(..) {
                if url == task.url {
                    frontier.lock().push_back(decision);
                } else {
                    kept.push((url, decision));
                }
            }
            *follow_ups = kept;
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn ready(url: &str) -> Decision {
    Decision::TaskReady(Task::new(url))
}

fn pool(workers: usize) -> WorkerPool {
    WorkerPool::new(
        WorkerPoolConfig::new()
            .with_worker_count(workers)
            .with_max_queue_depth(64),
    )
    .unwrap()
}

fn runner_config(max_in_flight: usize) -> RunnerConfig {
    RunnerConfig::new()
        .with_max_in_flight(max_in_flight)
        .with_completion_wait_ceiling_ms(200)
}

fn event_index(events: &[String], needle: &str) -> usize {
    events
        .iter()
        .position(|e| e == needle)
        .unwrap_or_else(|| panic!("event {needle} not found in {events:?}"))
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// Scenario A: at max_in_flight=1 the runner is observably equivalent to the
/// single-threaded loop — t1 is applied before t2 is even submitted.
#[test]
fn test_serial_ordering_at_concurrency_one() {
    let scheduler = ScriptedScheduler::new(vec![ready("t1"), ready("t2")]);
    let engine = Arc::new(RecordingEngine::with_delay(Duration::from_millis(20)));
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(2), runner_config(1));

    let report = runner.run_until_drained(&engine).unwrap();

    assert_eq!(report.submitted, 2);
    assert_eq!(report.applied, 2);
    let events = engine.events();
    assert!(event_index(&events, "apply:t1") < event_index(&events, "exec:t2"));
}

/// Scenario B: three tasks at limit 2 — exactly two overlap, all three are
/// applied, then the run terminates.
#[test]
fn test_bounded_overlap_three_tasks_limit_two() {
    let scheduler = ScriptedScheduler::new(vec![ready("t1"), ready("t2"), ready("t3")]);
    let engine = Arc::new(RecordingEngine {
        overlap_barrier: Some(Arc::new(Barrier::new(2))),
        execute_delay: Duration::from_millis(10),
        ..RecordingEngine::default()
    });
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(2), runner_config(2));

    let report = runner.run_until_drained(&engine).unwrap();

    assert_eq!(report.submitted, 3);
    assert_eq!(report.applied, 3);
    // The first two executions rendezvous, so the peak is exactly 2 and the
    // limit was never exceeded.
    assert_eq!(engine.max_executing.load(Ordering::SeqCst), 2);
    for url in ["t1", "t2", "t3"] {
        assert_eq!(engine.apply_count(url), 1);
    }
}

/// Scenario C: an idle park sleeps approximately the hinted duration instead
/// of re-querying in a burst.
#[test]
fn test_idle_park_sleeps_without_busy_requery() {
    let scheduler = ScriptedScheduler::new(vec![Decision::Park(Duration::from_millis(100))]);
    let pulls = scheduler.pull_counter();
    let engine = Arc::new(RecordingEngine::default());
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), runner_config(2));

    let start = Instant::now();
    let report = runner.run_until_drained(&engine).unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(100), "slept only {elapsed:?}");
    assert_eq!(report.parks, 1);
    // One pull for the park, one (or two, fill + decide) for the trailing
    // drained run-out — nothing resembling a busy loop.
    assert!(pulls.load(Ordering::Relaxed) <= 4);
}

/// Scenario D: an execution failure terminates the run and the failed task
/// is never applied.
#[test]
fn test_execution_failure_propagates_without_apply() {
    let scheduler = ScriptedScheduler::new(vec![ready("t1")]);
    let engine = Arc::new(RecordingEngine {
        fail_urls: vec!["t1".into()],
        ..RecordingEngine::default()
    });
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), runner_config(2));

    let err = runner.run_until_drained(&engine).unwrap_err();

    match err {
        RunnerError::Execution { url, .. } => assert_eq!(url, "t1"),
        other => panic!("expected execution error, got {other}"),
    }
    assert_eq!(engine.apply_count("t1"), 0);
}

// ============================================================================
// INVARIANTS
// ============================================================================

/// The in-flight limit caps logical concurrency even when the pool has more
/// physical workers than the limit.
#[test]
fn test_in_flight_never_exceeds_limit() {
    let tasks: Vec<Decision> = (0..8).map(|i| ready(&format!("t{i}"))).collect();
    let scheduler = ScriptedScheduler::new(tasks);
    let engine = Arc::new(RecordingEngine::with_delay(Duration::from_millis(15)));
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(8), runner_config(3));

    let report = runner.run_until_drained(&engine).unwrap();

    assert_eq!(report.applied, 8);
    assert!(engine.max_executing.load(Ordering::SeqCst) <= 3);
}

/// Every `TaskReady` is submitted exactly once, in retrieval order. A single
/// worker makes queue order observable as execution order.
#[test]
fn test_no_lost_decisions_submitted_in_order() {
    let tasks: Vec<Decision> = (0..5).map(|i| ready(&format!("t{i}"))).collect();
    let scheduler = ScriptedScheduler::new(tasks);
    let engine = Arc::new(RecordingEngine::default());
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), runner_config(3));

    let report = runner.run_until_drained(&engine).unwrap();

    assert_eq!(report.submitted, 5);
    let exec_order: Vec<String> = engine
        .events()
        .into_iter()
        .filter(|e| e.starts_with("exec:"))
        .collect();
    assert_eq!(exec_order, vec!["exec:t0", "exec:t1", "exec:t2", "exec:t3", "exec:t4"]);
    for i in 0..5 {
        assert_eq!(engine.apply_count(&format!("t{i}")), 1);
    }
}

/// A sub-1 in-flight configuration is coerced to 1 and still makes progress.
#[test]
fn test_zero_max_in_flight_coerced_to_one() {
    let scheduler = ScriptedScheduler::new(vec![ready("t1"), ready("t2")]);
    let engine = Arc::new(RecordingEngine::default());
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), runner_config(0));

    let report = runner.run_until_drained(&engine).unwrap();

    assert_eq!(report.applied, 2);
    assert!(engine.max_executing.load(Ordering::SeqCst) <= 1);
}

/// A zero-duration park means "retry immediately" and does not stall.
#[test]
fn test_zero_park_retries_immediately() {
    let scheduler = ScriptedScheduler::new(vec![Decision::Park(Duration::ZERO), ready("t1")]);
    let engine = Arc::new(RecordingEngine::default());
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), runner_config(2));

    let start = Instant::now();
    let report = runner.run_until_drained(&engine).unwrap();

    assert_eq!(report.applied, 1);
    assert!(start.elapsed() < Duration::from_secs(2));
}

/// A park hint longer than `max_park_ms` is capped so a pathological
/// scheduler cannot wedge the loop.
#[test]
fn test_long_park_hint_is_capped_at_max_park() {
    let scheduler = ScriptedScheduler::new(vec![Decision::Park(Duration::from_millis(1_500))]);
    let engine = Arc::new(RecordingEngine::default());
    let config = RunnerConfig::new()
        .with_max_in_flight(1)
        .with_max_park_ms(50);
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), config);

    let start = Instant::now();
    let report = runner.run_until_drained(&engine).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.parks, 1);
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(1), "park was not capped: {elapsed:?}");
}

/// Apply timestamps come from the runner's clock, read at drain time.
#[test]
fn test_apply_timestamp_comes_from_clock() {
    let scheduler = ScriptedScheduler::new(vec![ready("t1")]);
    let engine = Arc::new(RecordingEngine::default());
    let clock = ManualClock::starting_at(5_000);
    let mut runner = BoundedRunner::new(scheduler, clock, pool(1), runner_config(1));

    runner.run_until_drained(&engine).unwrap();

    let applied = engine.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].2, 5_000);
    assert_eq!(applied[0].1, "fetched:t1");
}

// ============================================================================
// FEEDBACK, WAKE, AND FAILURE EDGES
// ============================================================================

/// `Drained` is not permanent: applying an in-flight completion may enqueue
/// follow-up work, and the runner must pick it up before terminating.
#[test]
fn test_apply_feeds_new_work_back_in() {
    let frontier = Arc::new(Mutex::new(VecDeque::from([ready("seed")])));
    let scheduler = SharedScheduler {
        frontier: Arc::clone(&frontier),
    };
    let engine = Arc::new(RecordingEngine {
        execute_delay: Duration::from_millis(20),
        follow_ups: Mutex::new(vec![("seed".into(), ready("child"))]),
        frontier: Some(frontier),
        ..RecordingEngine::default()
    });
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(2), runner_config(2));

    let report = runner.run_until_drained(&engine).unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(engine.apply_count("seed"), 1);
    assert_eq!(engine.apply_count("child"), 1);
}

/// A wake during a long idle park is transient: the loop re-queries instead
/// of sleeping out the full hint or treating the wake as an error.
#[test]
fn test_wake_cuts_idle_park_short() {
    let scheduler = ScriptedScheduler::new(vec![Decision::Park(Duration::from_secs(30))]);
    let engine = Arc::new(RecordingEngine::default());
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), runner_config(1));
    let wake = runner.wake_handle();

    let handle = std::thread::spawn(move || {
        let start = Instant::now();
        let report = runner.run_until_drained(&engine).unwrap();
        (start.elapsed(), report)
    });

    std::thread::sleep(Duration::from_millis(100));
    wake.wake();

    let (elapsed, report) = handle.join().unwrap();
    assert!(elapsed < Duration::from_secs(10), "park was not cut short: {elapsed:?}");
    assert_eq!(report.applied, 0);
}

/// A panic inside `execute` is surfaced as an execution failure instead of
/// stranding the coordinator.
#[test]
fn test_execute_panic_surfaces_as_execution_error() {
    struct PanickingEngine;

    impl ProcessingEngine for PanickingEngine {
        type Disposition = ();

        fn execute(&self, _task: &Task) -> AppResult<()> {
            panic!("worker blew up");
        }

        fn apply(&self, _task: &Task, _disposition: (), _completed_at_ms: u128) {
            unreachable!("apply must not run for a failed task");
        }
    }

    let scheduler = ScriptedScheduler::new(vec![ready("t1")]);
    let engine = Arc::new(PanickingEngine);
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), runner_config(1));

    let err = runner.run_until_drained(&engine).unwrap_err();
    assert!(matches!(err, RunnerError::Execution { .. }));
}

/// A pool queue shallower than the burst the runner produces surfaces as a
/// pool error, fail-fast.
#[test]
fn test_pool_rejection_surfaces_as_pool_error() {
    let tasks: Vec<Decision> = (0..4).map(|i| ready(&format!("t{i}"))).collect();
    let scheduler = ScriptedScheduler::new(tasks);
    let engine = Arc::new(RecordingEngine::with_delay(Duration::from_millis(300)));
    let tight_pool = WorkerPool::new(
        WorkerPoolConfig::new()
            .with_worker_count(1)
            .with_max_queue_depth(1),
    )
    .unwrap();
    let mut runner = BoundedRunner::new(scheduler, SystemClock, tight_pool, runner_config(4));

    let err = runner.run_until_drained(&engine).unwrap_err();
    assert!(matches!(err, RunnerError::Pool(PoolError::QueueFull)));
}

/// Termination requires both conditions at once: drained scheduler and zero
/// in flight. A slow last task must still be drained and applied.
#[test]
fn test_terminates_only_after_last_completion_applied() {
    let scheduler = ScriptedScheduler::new(vec![ready("slow")]);
    let engine = Arc::new(RecordingEngine::with_delay(Duration::from_millis(150)));
    let mut runner = BoundedRunner::new(scheduler, SystemClock, pool(1), runner_config(2));

    let start = Instant::now();
    let report = runner.run_until_drained(&engine).unwrap();

    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(report.applied, 1);
    assert_eq!(engine.apply_count("slow"), 1);
}
