//! Task descriptor and completion event.
//!
//! A `TaskDescriptor` is built fresh for every offload and is immutable
//! once built: its fields are private and `run()` consumes it. It owns the
//! request's context for the duration of the task and gives it back inside
//! the [`Completion`] it posts to its completion sink.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::completion::CompletionSink;
use crate::context::RequestContext;
use crate::id::RequestId;
use crate::kerror;

/// Parameters for the blocking function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInput {
    /// Determines the workload (for the sleep workload, its duration).
    pub seed: u64,
    /// Workload unit.
    pub step: Duration,
}

impl TaskInput {
    pub const fn new(seed: u64, step: Duration) -> Self {
        Self { seed, step }
    }
}

/// Result written into the context by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOutput {
    elapsed: Duration,
}

impl TaskOutput {
    pub const fn new(elapsed: Duration) -> Self {
        Self { elapsed }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[inline]
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

impl fmt::Display for TaskOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.elapsed_ms())
    }
}

/// The blocking function. Runs on a worker thread and may block.
///
/// Must not panic. A panic ends the worker thread and the task's completion
/// is never posted, so its request stays suspended.
pub type WorkFn = fn(&TaskInput) -> TaskOutput;

/// Submission record: context + input + blocking function + completion target.
pub struct TaskDescriptor {
    context: Box<RequestContext>,
    input: TaskInput,
    work: WorkFn,
    on_complete: Arc<dyn CompletionSink>,
}

impl TaskDescriptor {
    pub fn new(
        context: Box<RequestContext>,
        input: TaskInput,
        work: WorkFn,
        on_complete: Arc<dyn CompletionSink>,
    ) -> Self {
        Self {
            context,
            input,
            work,
            on_complete,
        }
    }

    #[inline]
    pub fn request(&self) -> RequestId {
        self.context.request()
    }

    #[inline]
    pub fn input(&self) -> &TaskInput {
        &self.input
    }

    /// Execute the task on the calling (worker) thread.
    ///
    /// Runs `work` to completion, moves the context to `Done`, then hands
    /// the completion to the sink. Never touches pipeline state.
    pub fn run(self) {
        let TaskDescriptor {
            mut context,
            input,
            work,
            on_complete,
        } = self;

        let output = work(&input);
        if let Err(e) = context.complete(output) {
            kerror!("{}: cannot complete task: {}", context.request(), e);
        }

        let request = context.request();
        if let Err(e) = on_complete.push(Completion::new(context)) {
            kerror!("{}: completion notify failed: {}", request, e);
        }
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("request", &self.context.request())
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

/// A finished task, travelling from the worker back to the driving thread.
#[derive(Debug)]
pub struct Completion {
    context: Box<RequestContext>,
}

impl Completion {
    pub fn new(context: Box<RequestContext>) -> Self {
        Self { context }
    }

    #[inline]
    pub fn request(&self) -> RequestId {
        self.context.request()
    }

    #[inline]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Hand the context back to its request.
    pub fn into_context(self) -> Box<RequestContext> {
        self.context
    }
}
