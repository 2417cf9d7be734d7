//! Cooperative cancellation of a fixpoint computation.
//!
//! The engine polls its `ProgressTimer` once per iteration. As soon as the
//! timer answers `false`, the computation is aborted with
//! `Error::Cancelled`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait ProgressTimer {
    /// Returns `false` once the computation should stop.
    fn continue_processing(&self) -> bool;
}

/// A timer which never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl ProgressTimer for Unbounded {
    fn continue_processing(&self) -> bool {
        true
    }
}

/// Cancels once a wall-clock deadline has passed.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    deadline: Instant,
}

impl Deadline {
    pub fn new(deadline: Instant) -> Deadline {
        Deadline { deadline }
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Deadline {
        Deadline::new(Instant::now() + timeout)
    }
}

impl ProgressTimer for Deadline {
    fn continue_processing(&self) -> bool {
        Instant::now() < self.deadline
    }
}

/// Cancels once `cancel` has been called on any clone of this flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> CancellationFlag {
        CancellationFlag::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ProgressTimer for CancellationFlag {
    fn continue_processing(&self) -> bool {
        !self.is_cancelled()
    }
}
