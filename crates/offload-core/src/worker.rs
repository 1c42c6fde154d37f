//! Worker pool abstraction.
//!
//! A `WorkerPool` executes blocking task bodies on a fixed set of threads.
//! Workers can block independently; the driving thread never does.
//!
//! # Implementors
//!
//! - `FixedPool` (default): spawns N OS threads at creation time and
//!   feeds them from a bounded FIFO queue.
//!
//! # Submission
//!
//! Submission is split in two so that a rejected request is never touched:
//! `reserve()` claims a queue slot (or fails), and only then does the caller
//! move its context to `Processing` and `submit()` the task into the slot.
//! `try_submit()` does both for callers that don't need the split.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{OffloadError, Result};
use crate::task::TaskDescriptor;

/// A claimed slot in a pool's queue.
///
/// Dropping an unused reservation gives the slot back.
#[must_use = "a reservation holds a queue slot until it is submitted or dropped"]
pub struct Reservation {
    slots: Arc<AtomicUsize>,
    armed: bool,
}

impl Reservation {
    /// Wrap a slot already counted in `slots`.
    pub fn new(slots: Arc<AtomicUsize>) -> Self {
        Self { slots, armed: true }
    }

    /// Whether this reservation was issued against `slots`.
    #[inline]
    pub fn belongs_to(&self, slots: &Arc<AtomicUsize>) -> bool {
        Arc::ptr_eq(&self.slots, slots)
    }

    /// The slot is now occupied by a queued task; the pool releases it
    /// when a worker dequeues the task.
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.armed {
            self.slots.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Executes blocking tasks on a pool of threads.
///
/// **Contract:**
/// - `reserve()` and `submit()` must NEVER block the caller. A full queue
///   is `Err(SubmissionRejected)`; a stopped pool is `Err(PoolUnavailable)`.
/// - Accepted tasks start in FIFO order of submission.
/// - At most `total_workers()` tasks execute at once.
/// - A worker runs `TaskDescriptor::run()` to completion on its own thread;
///   it never calls back into the pipeline.
pub trait WorkerPool: Send + Sync {
    /// Name the pool was registered under.
    fn name(&self) -> &str;

    /// Claim a queue slot.
    fn reserve(&self) -> Result<Reservation>;

    /// Enqueue `task` into a slot claimed by `reserve()` on this pool.
    fn submit(&self, reservation: Reservation, task: TaskDescriptor);

    /// Reserve and submit in one step. On rejection the task is handed back
    /// untouched.
    fn try_submit(
        &self,
        task: TaskDescriptor,
    ) -> std::result::Result<(), (OffloadError, TaskDescriptor)> {
        match self.reserve() {
            Ok(reservation) => {
                self.submit(reservation, task);
                Ok(())
            }
            Err(e) => Err((e, task)),
        }
    }

    /// Number of workers currently executing a task.
    fn active_workers(&self) -> usize;

    /// Number of tasks waiting in the queue.
    fn queued(&self) -> usize;

    /// Total number of workers.
    fn total_workers(&self) -> usize;

    /// Queue capacity.
    fn capacity(&self) -> usize;

    /// Whether `shutdown()` has been called.
    fn is_shutdown(&self) -> bool;

    /// Stop accepting work, run everything already queued, then stop the
    /// workers. Blocks until drained.
    fn shutdown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_drop_releases() {
        let slots = Arc::new(AtomicUsize::new(1));
        let r = Reservation::new(Arc::clone(&slots));
        assert!(r.belongs_to(&slots));
        drop(r);
        assert_eq!(slots.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_reservation_commit_keeps_slot() {
        let slots = Arc::new(AtomicUsize::new(1));
        Reservation::new(Arc::clone(&slots)).commit();
        assert_eq!(slots.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_belongs_to_other_pool() {
        let a = Arc::new(AtomicUsize::new(1));
        let b = Arc::new(AtomicUsize::new(0));
        let r = Reservation::new(Arc::clone(&a));
        assert!(!r.belongs_to(&b));
    }
}
