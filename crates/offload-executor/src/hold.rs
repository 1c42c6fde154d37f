//! Outstanding-work guard.
//!
//! Every accepted offload takes an [`OffloadHold`] on its request's
//! [`Outstanding`] counter. The request keeps the hold until the completion
//! for that offload is observed on the driving thread, so the counter can
//! only reach zero after the worker has finished. Dropping the hold on any
//! path (normal resume, late discard, pipeline drop) releases it.

use std::cell::Cell;
use std::rc::Rc;

/// Per-request count of in-flight offloads.
#[derive(Debug, Clone, Default)]
pub struct Outstanding(Rc<Cell<usize>>);

impl Outstanding {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.0.get()
    }

    /// Take one unit of outstanding work.
    pub fn hold(&self) -> OffloadHold {
        self.0.set(self.0.get() + 1);
        OffloadHold {
            count: Rc::clone(&self.0),
        }
    }
}

/// One unit of outstanding work. Released on drop.
#[must_use = "dropping the hold releases the outstanding-work count immediately"]
#[derive(Debug)]
pub struct OffloadHold {
    count: Rc<Cell<usize>>,
}

impl Drop for OffloadHold {
    fn drop(&mut self) {
        let n = self.count.get();
        debug_assert!(n > 0, "outstanding-work counter underflow");
        self.count.set(n.saturating_sub(1));
    }
}
