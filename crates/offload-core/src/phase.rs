//! Phase handler return codes.

use core::fmt;

/// Response status handed back to the pipeline on error or finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Status(pub u16);

impl Status {
    pub const OK: Status = Status(200);
    pub const NOT_FOUND: Status = Status(404);
    pub const INTERNAL_SERVER_ERROR: Status = Status(500);
    pub const SERVICE_UNAVAILABLE: Status = Status(503);

    #[inline]
    pub const fn code(&self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a phase handler tells the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Proceed to the next handler / phase.
    Continue,
    /// Stop advancing this request without blocking others. The pipeline
    /// re-enters the same phase when the request is resumed.
    Suspend,
    /// Abort the request with the given status.
    Error(Status),
}
