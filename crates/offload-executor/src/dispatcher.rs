//! Completion dispatch.
//!
//! Workers post completions into the [`CompletionQueue`]; only the driving
//! thread pops them. For each completion the dispatcher confirms the owning
//! request is still live and hands the context back to it, or drops it when
//! the request has been torn down in the meantime. Resuming the request is
//! left to the pipeline, on the same thread.

use std::sync::Arc;
use std::time::Duration;

use offload_core::completion::CompletionSink;
use offload_core::error::Result;
use offload_core::task::Completion;
use offload_core::{kerror, ktrace, kwarn, RequestId};
use offload_module::CompletionQueue;

use crate::request::RequestTable;

/// What happened to one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Context restored; the request should be resumed.
    Resume(RequestId),
    /// Request gone or closing; result dropped.
    Discarded(RequestId),
}

pub struct CompletionDispatcher {
    queue: Arc<CompletionQueue>,
}

impl CompletionDispatcher {
    /// Dispatcher over a queue with the platform notifier.
    pub fn new() -> Result<Self> {
        Ok(Self::with_queue(Arc::new(CompletionQueue::new()?)))
    }

    pub fn with_queue(queue: Arc<CompletionQueue>) -> Self {
        Self { queue }
    }

    /// Completion target to hand to tasks.
    pub fn sink(&self) -> Arc<dyn CompletionSink> {
        self.queue.clone()
    }

    /// Completions posted but not yet dispatched.
    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Block until a worker signals or `timeout` passes.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        self.queue.wait(timeout)
    }

    #[inline]
    pub fn next(&self) -> Option<Completion> {
        self.queue.pop()
    }

    /// Return `completion`'s context to its request, if the request is
    /// still live.
    pub fn deliver(&self, completion: Completion, requests: &mut RequestTable) -> Delivery {
        let id = completion.request();
        ktrace!("{} completion observed", id);

        let req = match requests.entry_mut(id) {
            Some(req) => req,
            None => {
                kwarn!("{} completion for unknown request discarded", id);
                return Delivery::Discarded(id);
            }
        };

        if req.is_closing() {
            req.discard(completion.into_context());
            kwarn!("{} late completion discarded, request already finalized", id);
            requests.reap(id);
            return Delivery::Discarded(id);
        }

        match req.complete(completion.into_context()) {
            Ok(()) => Delivery::Resume(id),
            Err(e) => {
                kerror!("{} completion rejected: {}", id, e);
                Delivery::Discarded(id)
            }
        }
    }
}
