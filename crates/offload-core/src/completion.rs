//! Completion delivery abstraction.
//!
//! A `CompletionSink` is the notification target of a task. Workers push
//! completions into it; the driving thread drains them.
//! Default impl: lock-free queue + `Notifier` wake (`CompletionQueue`).

use crate::error::Result;
use crate::task::Completion;

/// Accepts completions from worker threads and wakes the consumer.
///
/// **Contract:**
/// - `push()` must NEVER block and must never run pipeline logic.
/// - A completion that was pushed is observable by the consumer even if the
///   wake itself fails (the consumer's poll timeout picks it up).
pub trait CompletionSink: Send + Sync {
    /// Hand a finished task to the driving thread.
    fn push(&self, completion: Completion) -> Result<()>;
}
