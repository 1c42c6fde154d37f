//! `CompletionQueue`: default `CompletionSink` implementation.
//!
//! Workers push finished tasks into a lock-free MPSC-style queue and signal
//! the driving thread through a [`Notifier`]. The driving thread waits on
//! the notifier and pops completions; it is the only consumer.
//!
//! The queue is unbounded: it never holds more than the pool's in-flight
//! tasks (queue capacity + worker count), which are already bounded at
//! submission.

use crossbeam_queue::SegQueue;

use offload_core::completion::CompletionSink;
use offload_core::notifier::Notifier;
use offload_core::task::Completion;
use offload_core::{ktrace, Result};

use std::time::Duration;

use crate::notifier::new_notifier;

pub struct CompletionQueue {
    queue: SegQueue<Completion>,
    notifier: Box<dyn Notifier>,
}

impl CompletionQueue {
    /// Queue backed by the platform notifier.
    pub fn new() -> Result<Self> {
        Ok(Self::with_notifier(new_notifier()?))
    }

    pub fn with_notifier(notifier: Box<dyn Notifier>) -> Self {
        Self {
            queue: SegQueue::new(),
            notifier,
        }
    }

    /// Take the next completion. Driving thread only.
    #[inline]
    pub fn pop(&self) -> Option<Completion> {
        self.queue.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Block the driving thread until a worker signals or `timeout` passes.
    /// Returns immediately if completions are already queued.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        if !self.queue.is_empty() {
            return Ok(true);
        }
        self.notifier.wait(timeout)
    }
}

impl CompletionSink for CompletionQueue {
    fn push(&self, completion: Completion) -> Result<()> {
        ktrace!("{} completion posted", completion.request());
        self.queue.push(completion);
        self.notifier.notify()
    }
}
