//! Core protocol types, contracts, and runner strategies.

pub mod decision;
pub mod engine;
pub mod error;
pub mod runner;
pub mod scheduler;

pub use decision::{Decision, Task};
pub use engine::ProcessingEngine;
pub use error::{AppResult, RunnerError};
pub use runner::bounded::BoundedRunner;
pub use runner::single::SingleRunner;
pub use runner::RunReport;
pub use scheduler::Scheduler;
