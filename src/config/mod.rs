//! Configuration models for the runner and worker pool.

pub mod runner;

pub use runner::{RunnerConfig, RunnerSettings, WorkerPoolConfig};
