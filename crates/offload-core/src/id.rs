//! Request identifier type

use core::fmt;

/// Identifies one request owned by the driving thread.
///
/// Ids are never reused within a pipeline, so a completion that arrives
/// after its request was torn down cannot be mistaken for a newer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Sentinel for "no request".
    pub const NONE: Self = Self(u64::MAX);

    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u64::MAX
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "req#none")
        } else {
            write!(f, "req#{}", self.0)
        }
    }
}
