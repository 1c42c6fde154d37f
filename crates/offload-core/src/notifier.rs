//! Driving-thread notification abstraction.
//!
//! A `Notifier` wakes the driving thread when new completions are
//! available.
//!
//! # Implementors
//!
//! - `EventFdNotifier` (Linux): writes 1 to an eventfd, the driving thread
//!   polls it. Compatible with epoll/io_uring poll loops.
//! - `CondvarNotifier` (elsewhere): a flag under a mutex + condvar.

use std::time::Duration;

use crate::error::Result;

/// Wakes the driving thread when completions are ready.
///
/// **Contract:**
/// - `notify()` must NEVER block.
/// - Multiple calls before the consumer wakes are coalesced
///   (eventfd semantics: counter increments, one read drains).
pub trait Notifier: Send + Sync {
    /// Signal that new completions are available.
    fn notify(&self) -> Result<()>;

    /// Block the driving thread until signalled or `timeout` elapses, then
    /// consume the pending signal.
    ///
    /// Returns `true` if a signal was consumed.
    fn wait(&self, timeout: Option<Duration>) -> Result<bool>;
}
