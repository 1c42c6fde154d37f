//! Per-request offload context.
//!
//! The context is the only object that crosses the thread boundary. It is
//! owned by the driving thread except between submission and completion,
//! when it is moved into the [`TaskDescriptor`](crate::task::TaskDescriptor)
//! and owned exclusively by the worker executing that task. Ownership is
//! transferred by value, so no lock guards it.

use crate::error::{OffloadError, Result};
use crate::id::RequestId;
use crate::state::OffloadState;
use crate::task::TaskOutput;

/// Offload progress and result for one request.
#[derive(Debug)]
pub struct RequestContext {
    /// Owning request. Only the driving thread acts on it.
    request: RequestId,
    state: OffloadState,
    /// Written once by the worker, immediately before completion.
    result: Option<TaskOutput>,
}

impl RequestContext {
    /// Create a context in `Init`.
    pub fn new(request: RequestId) -> Self {
        Self {
            request,
            state: OffloadState::Init,
            result: None,
        }
    }

    #[inline]
    pub fn request(&self) -> RequestId {
        self.request
    }

    #[inline]
    pub fn state(&self) -> OffloadState {
        self.state
    }

    /// The task result. `None` unless the context is `Done`.
    #[inline]
    pub fn result(&self) -> Option<TaskOutput> {
        if self.state.is_done() {
            self.result
        } else {
            None
        }
    }

    /// `Init → Processing`. Called by the phase handler once the pool has
    /// granted a queue slot.
    pub fn begin(&mut self) -> Result<()> {
        self.state = self.state.transition(OffloadState::Processing)?;
        Ok(())
    }

    /// `Processing → Done`, storing `output`. Called by the worker that owns
    /// the context, immediately before it posts the completion.
    pub fn complete(&mut self, output: TaskOutput) -> Result<()> {
        if self.result.is_some() {
            return Err(OffloadError::ProtocolViolation("result already written"));
        }
        self.state = self.state.transition(OffloadState::Done)?;
        self.result = Some(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lifecycle() {
        let mut ctx = RequestContext::new(RequestId::new(1));
        assert_eq!(ctx.state(), OffloadState::Init);
        assert!(ctx.result().is_none());

        ctx.begin().unwrap();
        assert_eq!(ctx.state(), OffloadState::Processing);
        assert!(ctx.result().is_none());

        ctx.complete(TaskOutput::new(Duration::from_millis(500))).unwrap();
        assert_eq!(ctx.state(), OffloadState::Done);
        assert_eq!(ctx.result().unwrap().elapsed_ms(), 500);
    }

    #[test]
    fn test_complete_from_init_rejected() {
        let mut ctx = RequestContext::new(RequestId::new(2));
        let err = ctx.complete(TaskOutput::new(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, OffloadError::InvalidTransition { .. }));
        assert_eq!(ctx.state(), OffloadState::Init);
    }

    #[test]
    fn test_result_write_once() {
        let mut ctx = RequestContext::new(RequestId::new(3));
        ctx.begin().unwrap();
        ctx.complete(TaskOutput::new(Duration::from_millis(100))).unwrap();
        assert!(ctx.complete(TaskOutput::new(Duration::from_millis(900))).is_err());
        assert_eq!(ctx.result().unwrap().elapsed_ms(), 100);
    }

    #[test]
    fn test_double_begin_rejected() {
        let mut ctx = RequestContext::new(RequestId::new(4));
        ctx.begin().unwrap();
        assert!(ctx.begin().is_err());
        assert_eq!(ctx.state(), OffloadState::Processing);
    }
}
