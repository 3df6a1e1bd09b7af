//! Runner and worker pool configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound applied to completion waits issued under a `Park` hint.
const DEFAULT_COMPLETION_WAIT_CEILING_MS: u64 = 500;

/// Default cap on how long a runner sleeps for a single park hint.
const DEFAULT_MAX_PARK_MS: u64 = 10_000;

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of dedicated worker threads.
    pub worker_count: usize,
    /// Maximum queued jobs before submission is rejected.
    pub max_queue_depth: usize,
    /// Stack size for worker threads, in bytes.
    pub thread_stack_size: usize,
}

impl WorkerPoolConfig {
    /// Create a configuration with defaults: one worker per logical CPU,
    /// queue depth 256, 2 MiB stacks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            worker_count: num_cpus::get(),
            max_queue_depth: 256,
            thread_stack_size: 2 * 1024 * 1024,
        }
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the maximum queue depth.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Set the worker thread stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum logical in-flight submissions. Values below 1 are coerced to 1
    /// rather than rejected.
    pub max_in_flight: usize,
    /// Ceiling on completion waits issued under a `Park` hint, milliseconds.
    pub completion_wait_ceiling_ms: u64,
    /// Cap on any single park sleep, milliseconds.
    pub max_park_ms: u64,
}

impl RunnerConfig {
    /// Create a configuration with defaults: in-flight limit of one per
    /// logical CPU, 500ms wait ceiling, 10s park cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_in_flight: num_cpus::get(),
            completion_wait_ceiling_ms: DEFAULT_COMPLETION_WAIT_CEILING_MS,
            max_park_ms: DEFAULT_MAX_PARK_MS,
        }
    }

    /// Set the maximum logical in-flight count.
    #[must_use]
    pub const fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Set the completion wait ceiling in milliseconds.
    #[must_use]
    pub const fn with_completion_wait_ceiling_ms(mut self, ms: u64) -> Self {
        self.completion_wait_ceiling_ms = ms;
        self
    }

    /// Set the park sleep cap in milliseconds.
    #[must_use]
    pub const fn with_max_park_ms(mut self, ms: u64) -> Self {
        self.max_park_ms = ms;
        self
    }

    /// In-flight limit with misconfiguration coerced up to 1 (non-fatal).
    #[must_use]
    pub const fn effective_max_in_flight(&self) -> usize {
        if self.max_in_flight < 1 {
            1
        } else {
            self.max_in_flight
        }
    }

    /// Completion wait ceiling as a duration.
    #[must_use]
    pub const fn completion_wait_ceiling(&self) -> Duration {
        Duration::from_millis(self.completion_wait_ceiling_ms)
    }

    /// Park sleep cap as a duration.
    #[must_use]
    pub const fn max_park(&self) -> Duration {
        Duration::from_millis(self.max_park_ms)
    }

    /// Validate configuration values. `max_in_flight` is deliberately not
    /// checked here; it is coerced, not rejected.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.completion_wait_ceiling_ms == 0 {
            return Err("completion_wait_ceiling_ms must be greater than 0".into());
        }
        if self.max_park_ms == 0 {
            return Err("max_park_ms must be greater than 0".into());
        }
        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Root configuration: one runner driving one worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Bounded runner settings.
    pub runner: RunnerConfig,
    /// Worker pool settings.
    pub pool: WorkerPoolConfig,
}

impl RunnerSettings {
    /// Validate the runner and pool sections together.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field. A pool queue
    /// shallower than the in-flight limit is rejected here because the runner
    /// may legitimately have that many undrained submissions queued at once.
    pub fn validate(&self) -> Result<(), String> {
        self.runner.validate().map_err(|e| format!("runner: {e}"))?;
        self.pool.validate().map_err(|e| format!("pool: {e}"))?;
        if self.pool.max_queue_depth < self.runner.effective_max_in_flight() {
            return Err(format!(
                "pool.max_queue_depth ({}) must be at least runner.max_in_flight ({})",
                self.pool.max_queue_depth,
                self.runner.effective_max_in_flight()
            ));
        }
        Ok(())
    }

    /// Parse settings from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error description.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let settings: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        settings.validate()?;
        Ok(settings)
    }
}
