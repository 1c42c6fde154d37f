//! Driving-thread counters.

use std::cell::Cell;

/// Snapshot returned by `Pipeline::stats()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Tasks accepted by a pool
    pub submitted: u64,
    /// Requests re-entered after their completion was delivered
    pub resumed: u64,
    /// Late completions dropped for torn-down requests
    pub discarded: u64,
    /// Offloads refused at submission
    pub rejected: u64,
}

/// Live counters, shared by the pipeline and its requests. Driving thread only.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: Cell<u64>,
    resumed: Cell<u64>,
    discarded: Cell<u64>,
    rejected: Cell<u64>,
}

#[inline]
fn bump(c: &Cell<u64>) {
    c.set(c.get() + 1);
}

impl Counters {
    pub(crate) fn submitted(&self) {
        bump(&self.submitted);
    }

    pub(crate) fn resumed(&self) {
        bump(&self.resumed);
    }

    pub(crate) fn discarded(&self) {
        bump(&self.discarded);
    }

    pub(crate) fn rejected(&self) {
        bump(&self.rejected);
    }

    pub(crate) fn snapshot(&self) -> DriverStats {
        DriverStats {
            submitted: self.submitted.get(),
            resumed: self.resumed.get(),
            discarded: self.discarded.get(),
            rejected: self.rejected.get(),
        }
    }
}
