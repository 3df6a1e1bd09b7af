//! Completion-aware queue between worker threads and the coordinating thread.
//!
//! Worker threads push finished work in; the coordinating thread takes it out
//! either without blocking ([`CompletionQueue::poll`]) or with an optionally
//! bounded wait ([`CompletionQueue::wait`]). A [`WakeHandle`] lets external
//! code nudge a coordinator out of a long wait; a wakeup is never an error,
//! just "nothing ready right now".
//!
//! # Design
//!
//! - **No polling loops**: waits block on `crossbeam_channel::select!`
//! - **Wakes coalesce**: the wake channel holds at most one pending signal
//! - **No disconnect handling**: the queue owns a live sender for its whole
//!   lifetime, so the completion channel cannot appear closed to `wait`

use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::debug;

use crate::core::decision::Task;
use crate::core::AppResult;

/// A finished work item: the task that ran and what came of running it.
///
/// The outcome is `Err` when `execute` failed (or panicked on the worker);
/// the runner surfaces that error when it drains this completion.
#[derive(Debug)]
pub struct Completion<D> {
    /// The task that was executed.
    pub task: Task,
    /// Disposition produced by the engine, or the execution failure.
    pub outcome: AppResult<D>,
}

/// Result of waiting on a [`CompletionQueue`].
#[derive(Debug)]
pub enum WaitOutcome<D> {
    /// A completion arrived.
    Completion(Completion<D>),
    /// The bounded wait elapsed with nothing ready.
    TimedOut,
    /// A [`WakeHandle`] fired. Transient: the caller should re-evaluate its
    /// loop rather than treat this as a timeout or an error.
    WokenUp,
}

/// Clonable handle worker threads use to report completions.
#[derive(Debug, Clone)]
pub struct CompletionSender<D> {
    tx: Sender<Completion<D>>,
}

impl<D> CompletionSender<D> {
    /// Deliver a completion. If the coordinating side is already gone the
    /// completion is dropped; the run it belonged to has ended.
    pub fn send(&self, completion: Completion<D>) {
        if self.tx.send(completion).is_err() {
            debug!("completion receiver gone; dropping completion");
        }
    }
}

/// Clonable nudge for a coordinating thread blocked in a wait or idle park.
///
/// This is the cancellation-signal analog for a thread-based runner: firing
/// it makes the current wait return [`WaitOutcome::WokenUp`] so the loop can
/// re-query its scheduler. Signals coalesce; firing twice before the
/// coordinator wakes is the same as firing once.
#[derive(Debug, Clone)]
pub struct WakeHandle {
    tx: Sender<()>,
}

impl WakeHandle {
    /// Create a connected handle/signal pair.
    #[must_use]
    pub fn pair() -> (Self, Receiver<()>) {
        // Capacity 1 so repeated wakes coalesce instead of queueing.
        let (tx, rx) = bounded(1);
        (Self { tx }, rx)
    }

    /// Nudge the coordinating thread. Never blocks.
    pub fn wake(&self) {
        let _ = self.tx.try_send(());
    }
}

/// The completion queue consumed by a single coordinating thread.
pub struct CompletionQueue<D> {
    tx: Sender<Completion<D>>,
    rx: Receiver<Completion<D>>,
    wake_rx: Receiver<()>,
}

impl<D> CompletionQueue<D> {
    /// Create a queue wired to the given wake signal.
    #[must_use]
    pub fn new(wake_rx: Receiver<()>) -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx, wake_rx }
    }

    /// Handle for worker threads to push completions through.
    #[must_use]
    pub fn sender(&self) -> CompletionSender<D> {
        CompletionSender {
            tx: self.tx.clone(),
        }
    }

    /// Take one completion if one is ready, without blocking.
    #[must_use]
    pub fn poll(&self) -> Option<Completion<D>> {
        self.rx.try_recv().ok()
    }

    /// Wait for one completion, bounded by `bound` if given, unbounded
    /// otherwise. A wake signal ends the wait early with
    /// [`WaitOutcome::WokenUp`].
    pub fn wait(&self, bound: Option<Duration>) -> WaitOutcome<D> {
        match bound {
            Some(limit) => crossbeam_channel::select! {
                recv(self.rx) -> msg => Self::received(msg),
                recv(self.wake_rx) -> _ => WaitOutcome::WokenUp,
                default(limit) => WaitOutcome::TimedOut,
            },
            None => crossbeam_channel::select! {
                recv(self.rx) -> msg => Self::received(msg),
                recv(self.wake_rx) -> _ => WaitOutcome::WokenUp,
            },
        }
    }

    fn received(msg: Result<Completion<D>, crossbeam_channel::RecvError>) -> WaitOutcome<D> {
        // The queue holds a live sender, so disconnect is unreachable in
        // practice; recover as a wakeup and let the loop re-evaluate.
        msg.map_or(WaitOutcome::WokenUp, WaitOutcome::Completion)
    }
}
