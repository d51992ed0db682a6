//! Session and generation error types.
//!
//! Every session operation either commits all of its field updates or fails
//! with a [`SessionError`] and leaves the stored record untouched.
//!
//! [`GenerationError`] lives here rather than in `proctor-generation` so the
//! session service can downcast generator failures and decide whether to
//! retry without string matching.

use thiserror::Error;

use crate::model::{CandidateId, SessionStatus};

/// Errors returned by session lifecycle and integrity operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad input, rejected before any mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not legal in the session's current status.
    #[error("cannot {operation} while session is {status}")]
    InvalidState {
        operation: &'static str,
        status: &'static str,
    },

    /// Unknown access token or session id.
    #[error("session not found: {0}")]
    NotFound(String),

    /// A session is already being generated for this candidate.
    #[error("session generation already in progress for candidate {candidate_id}")]
    Conflict { candidate_id: CandidateId },

    /// No break time left.
    #[error("break budget exhausted: {used_seconds}s of {allowed_seconds}s used")]
    BudgetExhausted {
        used_seconds: u64,
        allowed_seconds: u64,
    },

    /// Candidate-facing mutation on a blocked session.
    #[error("session is disqualified: {reason}")]
    Disqualified { reason: String },

    /// The question generator failed after all retries.
    #[error("question generation failed: {0}")]
    Generation(String),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors that can occur when calling a question generator.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response could not be parsed into questions.
    #[error("malformed generator response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            GenerationError::AuthenticationFailed(_) | GenerationError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            GenerationError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

impl SessionError {
    pub(crate) fn invalid_state(operation: &'static str, status: &SessionStatus) -> Self {
        SessionError::InvalidState {
            operation,
            status: status.label(),
        }
    }

    /// Returns `true` if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Conflict { .. } | SessionError::Generation(_)
        )
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "validation",
            SessionError::InvalidState { .. } => "invalid_state",
            SessionError::NotFound(_) => "not_found",
            SessionError::Conflict { .. } => "conflict",
            SessionError::BudgetExhausted { .. } => "budget_exhausted",
            SessionError::Disqualified { .. } => "disqualified",
            SessionError::Generation(_) => "generation",
            SessionError::Storage(_) => "storage",
        }
    }
}
