//! Offload state machine

use core::fmt;

use crate::error::{OffloadError, Result};

/// Offload progress of one request context.
///
/// ```text
/// Init ──submit──▶ Processing ──worker done──▶ Done
/// ```
///
/// `Done` is terminal for a single offload step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OffloadState {
    /// No work submitted yet
    Init = 0,

    /// Task accepted by the pool, worker owns the context
    Processing = 1,

    /// Result available on the driving thread
    Done = 2,
}

impl OffloadState {
    /// Name used in log lines.
    pub const fn name(&self) -> &'static str {
        match self {
            OffloadState::Init => "INIT",
            OffloadState::Processing => "PROCESSING",
            OffloadState::Done => "DONE",
        }
    }

    /// Whether `self → to` is a legal edge.
    #[inline]
    pub const fn can_transition(&self, to: OffloadState) -> bool {
        matches!(
            (self, to),
            (OffloadState::Init, OffloadState::Processing)
                | (OffloadState::Processing, OffloadState::Done)
        )
    }

    /// Move to `to`, rejecting any edge other than
    /// `Init → Processing` and `Processing → Done`.
    pub fn transition(self, to: OffloadState) -> Result<OffloadState> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(OffloadError::InvalidTransition { from: self, to })
        }
    }

    #[inline]
    pub const fn is_done(&self) -> bool {
        matches!(self, OffloadState::Done)
    }
}

impl Default for OffloadState {
    fn default() -> Self {
        OffloadState::Init
    }
}

impl fmt::Display for OffloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        let s = OffloadState::Init;
        let s = s.transition(OffloadState::Processing).unwrap();
        let s = s.transition(OffloadState::Done).unwrap();
        assert!(s.is_done());
    }

    #[test]
    fn test_illegal_transitions() {
        let cases = [
            (OffloadState::Init, OffloadState::Init),
            (OffloadState::Init, OffloadState::Done),
            (OffloadState::Processing, OffloadState::Init),
            (OffloadState::Processing, OffloadState::Processing),
            (OffloadState::Done, OffloadState::Init),
            (OffloadState::Done, OffloadState::Processing),
            (OffloadState::Done, OffloadState::Done),
        ];
        for (from, to) in cases {
            assert_eq!(
                from.transition(to),
                Err(OffloadError::InvalidTransition { from, to })
            );
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(OffloadState::Init.to_string(), "INIT");
        assert_eq!(OffloadState::Processing.to_string(), "PROCESSING");
        assert_eq!(OffloadState::Done.to_string(), "DONE");
    }
}
