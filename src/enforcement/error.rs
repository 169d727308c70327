//! Error types for the enforcement system
//!
//! This module defines the various errors that can occur during an
//! enforcement run.

use crate::gateway::GatewayError;
use thiserror::Error;

/// Errors that abort a single enforcement run
///
/// Either variant is terminal for the run it occurs in and invisible to
/// every other run.
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// Could not obtain current submission, moderator, or message-history state
    #[error("failed to fetch current state: {0}")]
    Fetch(#[source] GatewayError),

    /// A comment, removal, lock, or message call failed
    #[error("moderation action failed: {0}")]
    Action(#[source] GatewayError),
}

/// Result type for enforcement operations
pub type EnforcementResult<T> = Result<T, EnforcementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EnforcementError::Fetch(GatewayError::NotFound("t3_abc".to_string()));
        assert_eq!(
            error.to_string(),
            "failed to fetch current state: not found: t3_abc"
        );

        let error = EnforcementError::Action(GatewayError::Api {
            status: 403,
            detail: "insufficient scope".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "moderation action failed: api error (403): insufficient scope"
        );
    }
}
