//! Worker pool with dedicated OS threads for task execution.
//!
//! The pool runs opaque job closures so it can be constructed before the
//! processing engine is known; the runner binds engine, task, and completion
//! channel into each job at submission time.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel recv; dropping the sender
//!   unblocks them naturally on shutdown
//! - **Logical vs physical concurrency**: the pool's worker count is
//!   independent of the runner's in-flight limit; the limit caps outstanding
//!   submissions, not threads
//! - **Lock-free counters**: statistics use atomics, never the job path locks

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;

/// A unit of work submitted to the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors that can occur when using a [`WorkerPool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// The job queue is full; no more jobs can be accepted.
    #[error("job queue is full")]
    QueueFull,
    /// The pool has been shut down.
    #[error("pool has been shut down")]
    PoolShutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal error (worker thread spawn failure, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Jobs waiting in the queue.
    pub queued_jobs: u64,
    /// Currently executing jobs.
    pub active_jobs: u64,
    /// Total jobs completed.
    pub completed_jobs: u64,
    /// Total jobs submitted.
    pub submitted_jobs: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    queued_jobs: AtomicU64,
    active_jobs: AtomicU64,
    completed_jobs: AtomicU64,
    submitted_jobs: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
            submitted_jobs: self.submitted_jobs.load(Ordering::Relaxed),
        }
    }
}

/// Worker pool with dedicated OS threads.
///
/// # Design
///
/// - Workers block on channel recv; no polling anywhere
/// - `submit` is non-blocking: it fails immediately with
///   [`PoolError::QueueFull`] rather than applying backpressure (admission
///   control belongs to the runner's in-flight limit)
/// - Clean shutdown: dropping the sender unblocks all idle workers
pub struct WorkerPool {
    config: WorkerPoolConfig,
    /// Job sender (to workers). `None` after shutdown.
    job_tx: Mutex<Option<Sender<Job>>>,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new worker pool, spawning `config.worker_count` OS threads.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid,
    /// or [`PoolError::Internal`] if a worker thread could not be spawned.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (job_tx, job_rx) = bounded::<Job>(config.max_queue_depth);
        let counters = Arc::new(PoolCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = spawn_worker(
                worker_id,
                job_rx.clone(),
                Arc::clone(&counters),
                Arc::clone(&shutdown),
                config.thread_stack_size,
            )?;
            workers.push(worker);
        }

        info!(
            worker_count = config.worker_count,
            max_queue_depth = config.max_queue_depth,
            "worker pool initialized with dedicated OS threads"
        );

        Ok(Self {
            config,
            job_tx: Mutex::new(Some(job_tx)),
            counters,
            shutdown,
            workers: Mutex::new(workers),
        })
    }

    /// Submit a job. The enqueue itself never blocks.
    ///
    /// # Errors
    ///
    /// - [`PoolError::QueueFull`] if the job queue is full
    /// - [`PoolError::PoolShutdown`] if the pool has been shut down
    pub fn submit(&self, job: Job) -> Result<(), PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let job_tx_guard = self.job_tx.lock();
        let Some(job_tx) = job_tx_guard.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        match job_tx.try_send(job) {
            Ok(()) => {
                self.counters.submitted_jobs.fetch_add(1, Ordering::Relaxed);
                self.counters.queued_jobs.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(crossbeam_channel::TrySendError::Full(_)) => {
                warn!("worker pool queue is full");
                Err(PoolError::QueueFull)
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => Err(PoolError::PoolShutdown),
        }
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Shut down the pool gracefully.
    ///
    /// Drops the job sender to unblock idle workers, then joins each worker
    /// with a 2-second timeout. Workers that do not exit in time are detached
    /// rather than hanging the caller.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return; // Already shut down
        }

        info!("shutting down worker pool");

        {
            let mut job_tx = self.job_tx.lock();
            *job_tx = None;
        }

        let mut workers = self.workers.lock();
        let worker_count = workers.len();

        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = std::sync::mpsc::channel();
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });

            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(true) => {
                    debug!(worker_id = idx, "worker joined");
                }
                Ok(false) => {
                    warn!(worker_id = idx, "worker panicked");
                }
                Err(_) => {
                    warn!(worker_id = idx, "worker did not exit within timeout, detaching");
                }
            }

            let _ = join_thread.join();
        }

        info!(worker_count, "worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join workers in Drop; an explicit
        // shutdown() is required for graceful cleanup.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let mut job_tx = self.job_tx.lock();
            *job_tx = None;
            debug!("worker pool dropped without explicit shutdown; workers detached");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    job_rx: Receiver<Job>,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    stack_size: usize,
) -> Result<JoinHandle<()>, PoolError> {
    thread::Builder::new()
        .name(format!("fr-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "worker thread started");

            // Blocking recv, no polling. When the sender is dropped, recv
            // returns Err and the worker exits.
            loop {
                let job = match job_rx.recv() {
                    Ok(job) => job,
                    Err(_) => {
                        debug!(worker_id, "worker channel closed, exiting");
                        break;
                    }
                };

                if shutdown.load(Ordering::Acquire) {
                    // The job was dequeued but will not run; keep the queue
                    // gauge honest before exiting.
                    counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                    debug!(worker_id, "worker shutdown during job, dropping queued job");
                    break;
                }

                counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                counters.active_jobs.fetch_add(1, Ordering::Relaxed);

                job();

                counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
                counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
            }

            debug!(worker_id, "worker thread exiting");
        })
        .map_err(|e| {
            error!(worker_id, error = %e, "failed to spawn worker thread");
            PoolError::Internal(format!("failed to spawn worker thread: {e}"))
        })
}
