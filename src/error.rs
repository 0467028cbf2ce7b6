//! Error types
//!
//! - `ServiceError`: failures talking to the review/hint/distractor endpoints
//!   or the progress store. Rendered as feedback text, never retried.
//! - `SessionError`: a host asked the session for a transition its current
//!   phase does not allow.

use thiserror::Error;

use crate::session::SessionPhase;

/// Errors from external collaborators.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Service returned HTTP {status}")]
    Status { status: u16 },

    #[error("Invalid response payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Errors from session state transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot {action} while {phase:?}")]
    InvalidTransition {
        phase: SessionPhase,
        action: &'static str,
    },

    #[error("No review is pending")]
    NoPendingReview,

    #[error("Review {ticket} is no longer pending")]
    StaleReview { ticket: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = SessionError::InvalidTransition {
            phase: SessionPhase::Playing,
            action: "switch to manual entry",
        };
        assert_eq!(e.to_string(), "Cannot switch to manual entry while Playing");

        let e = ServiceError::Status { status: 503 };
        assert_eq!(e.to_string(), "Service returned HTTP 503");

        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: ServiceError = parse.into();
        assert!(e.to_string().starts_with("Invalid response payload"));
    }
}
