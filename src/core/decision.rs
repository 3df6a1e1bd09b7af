//! Scheduler decisions and the opaque task they carry.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;

/// A unit of work handed from the scheduler to a runner.
///
/// The runner never inspects a task beyond passing it through: identity,
/// attempt counting, and scheduling timestamps are scheduler/engine concerns.
/// The trace token ties log lines from submission, execution, and apply
/// together across threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Identity of the work item (typically a URL for crawl workloads).
    pub url: String,
    /// How many times this task has been attempted before.
    pub attempt: u32,
    /// When the scheduler made this task ready, milliseconds since epoch.
    pub scheduled_at_ms: u128,
    /// Correlation token for diagnostics.
    pub trace_id: Uuid,
}

impl Task {
    /// Create a first-attempt task scheduled now, with a fresh trace token.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempt: 0,
            scheduled_at_ms: now_ms(),
            trace_id: Uuid::new_v4(),
        }
    }

    /// Derive the next-attempt version of this task, keeping its trace token.
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        Self {
            url: self.url.clone(),
            attempt: self.attempt + 1,
            scheduled_at_ms: now_ms(),
            trace_id: self.trace_id,
        }
    }
}

/// The three-way outcome of pulling the scheduler.
///
/// This set is closed on purpose: runners match it exhaustively and must
/// never need a fallback arm. Exactly one variant is produced per pull.
#[derive(Debug, Clone)]
pub enum Decision {
    /// A task is ready for execution right now.
    TaskReady(Task),
    /// No task is ready; wait up to the given duration before asking again.
    /// Zero means "retry immediately without sleeping".
    Park(Duration),
    /// The scheduler has no work and will have none without external
    /// stimulus. Not necessarily permanent: applying a completed task's
    /// outcome may feed new work back in, so runners re-query after applying.
    Drained,
}

impl Decision {
    /// Whether this decision carries a ready task.
    #[must_use]
    pub const fn is_task_ready(&self) -> bool {
        matches!(self, Self::TaskReady(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new_starts_at_attempt_zero() {
        let task = Task::new("https://example.com/a");
        assert_eq!(task.url, "https://example.com/a");
        assert_eq!(task.attempt, 0);
        assert!(task.scheduled_at_ms > 0);
    }

    #[test]
    fn test_next_attempt_increments_and_keeps_trace() {
        let task = Task::new("https://example.com/a");
        let retry = task.next_attempt();
        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.trace_id, task.trace_id);
        assert_eq!(retry.url, task.url);
    }

    #[test]
    fn test_decision_is_task_ready() {
        assert!(Decision::TaskReady(Task::new("https://example.com")).is_task_ready());
        assert!(!Decision::Park(Duration::from_millis(5)).is_task_ready());
        assert!(!Decision::Drained.is_task_ready());
    }
}
