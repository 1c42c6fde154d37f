//! Offload error types.

use core::fmt;

use crate::id::RequestId;
use crate::phase::Status;
use crate::state::OffloadState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffloadError {
    /// Named pool not registered, or shut down.
    PoolUnavailable,
    /// Pool queue is full.
    SubmissionRejected,
    /// Could not construct a context, task or worker.
    AllocationFailure,
    /// Illegal state machine edge.
    InvalidTransition {
        from: OffloadState,
        to: OffloadState,
    },
    /// Caller broke the suspend/resume contract.
    ProtocolViolation(&'static str),
    /// No live request with this id.
    UnknownRequest(RequestId),
    /// Rejected configuration.
    Config(&'static str),
    /// OS error with errno.
    Os(i32),
}

impl OffloadError {
    /// Status surfaced to the pipeline when this error aborts a request.
    pub const fn status(&self) -> Status {
        match self {
            Self::UnknownRequest(_) => Status::NOT_FOUND,
            _ => Status::INTERNAL_SERVER_ERROR,
        }
    }

    /// Read errno after a failed libc call.
    pub fn last_os_error() -> Self {
        Self::Os(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

impl fmt::Display for OffloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolUnavailable => write!(f, "worker pool unavailable"),
            Self::SubmissionRejected => write!(f, "worker pool queue full"),
            Self::AllocationFailure => write!(f, "allocation failed"),
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid offload transition {} -> {}", from, to)
            }
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
            Self::UnknownRequest(id) => write!(f, "unknown request {}", id),
            Self::Config(msg) => write!(f, "invalid config: {}", msg),
            Self::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for OffloadError {}

pub type Result<T> = std::result::Result<T, OffloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(OffloadError::SubmissionRejected.to_string(), "worker pool queue full");
        let e = OffloadError::InvalidTransition {
            from: OffloadState::Done,
            to: OffloadState::Init,
        };
        assert_eq!(e.to_string(), "invalid offload transition DONE -> INIT");
    }

    #[test]
    fn test_offload_failures_are_internal_errors() {
        for e in [
            OffloadError::PoolUnavailable,
            OffloadError::SubmissionRejected,
            OffloadError::AllocationFailure,
        ] {
            assert_eq!(e.status(), Status::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(
            OffloadError::UnknownRequest(RequestId::new(1)).status(),
            Status::NOT_FOUND
        );
    }
}
