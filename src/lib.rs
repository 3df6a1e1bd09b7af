//! # Frontier Runner
//!
//! A scheduler-driven task runner for crawl/processing workloads.
//!
//! This library implements the decision protocol between a pull-based
//! scheduler and the runners that consume it. On every pull the scheduler
//! reports exactly one [`Decision`](core::Decision): a task that is ready
//! now, a backoff hint ("park"), or "drained" (no work without external
//! stimulus). Two runner strategies consume that protocol:
//!
//! - **[`SingleRunner`](core::SingleRunner)**: synchronous reference loop —
//!   execute one task at a time, apply its outcome immediately.
//! - **[`BoundedRunner`](core::BoundedRunner)**: drives a worker pool up to a
//!   logical in-flight limit, drains completions opportunistically, applies
//!   backoff without busy-spinning, and terminates only when the scheduler is
//!   drained *and* nothing remains in flight.
//!
//! ## Core Problem Solved
//!
//! Crawl-style workloads are pull-driven and feedback-coupled: applying one
//! completed task's outcome may enqueue follow-up work, so "no work right
//! now" does not mean "no work ever". The bounded runner keeps the scheduler
//! and the outcome-apply path confined to a single coordinating thread
//! (neither needs internal locking), while task execution fans out across a
//! dedicated worker thread pool.
//!
//! ## Example
//!
//! ```rust,ignore
//! use frontier_runner::config::{RunnerConfig, WorkerPoolConfig};
//! use frontier_runner::core::BoundedRunner;
//! use frontier_runner::infra::WorkerPool;
//! use frontier_runner::util::SystemClock;
//! use std::sync::Arc;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(4))?;
//! let mut runner = BoundedRunner::new(
//!     my_scheduler,
//!     SystemClock,
//!     pool,
//!     RunnerConfig::new().with_max_in_flight(8),
//! );
//! let report = runner.run_until_drained(&Arc::new(my_engine))?;
//! println!("applied {} tasks", report.applied);
//! ```
//!
//! For complete examples, see `tests/bounded_runner_test.rs`.

/// Core protocol: decisions, contracts, and the two runner strategies.
pub mod core;
/// Configuration models for the runner and worker pool.
pub mod config;
/// Infrastructure adapters: worker pool and completion transport.
pub mod infra;
/// Shared utilities: clocks and telemetry.
pub mod util;
