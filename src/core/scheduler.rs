//! The pull-based decision source consumed by runners.

use super::Decision;

/// A pull-based source of work.
///
/// Runners serialize all calls: `next_decision` is only ever invoked from the
/// coordinating thread, which is why it takes `&mut self` and implementations
/// need no internal locking. How a scheduler picks the next task or sizes a
/// backoff hint is entirely its own business.
///
/// A `Park(duration)` is a hint, not a promise that a task becomes ready
/// after exactly `duration`. Implementations must not block indefinitely
/// without eventually returning `Park` or `Drained`.
pub trait Scheduler {
    /// Pull exactly one decision.
    fn next_decision(&mut self) -> Decision;
}

impl<S: Scheduler + ?Sized> Scheduler for Box<S> {
    fn next_decision(&mut self) -> Decision {
        (**self).next_decision()
    }
}
