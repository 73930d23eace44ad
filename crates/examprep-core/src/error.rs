//! Error types for remote collaborators and generated content.
//!
//! Remote errors live in `examprep-core` so the session and submission layers
//! can downcast and classify failures (auth, permanent, retryable) without
//! string matching.

use thiserror::Error;

/// Errors that can occur when talking to the remote API.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The credential is missing, expired, or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RemoteError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            RemoteError::Unauthorized(_)
                | RemoteError::NotFound(_)
                | RemoteError::MalformedResponse(_)
        )
    }

    /// Returns `true` for credential failures, which end the current screen.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RemoteError::Unauthorized(_))
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            RemoteError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Find the first [`RemoteError`] in an error chain.
pub fn remote_error(err: &anyhow::Error) -> Option<&RemoteError> {
    err.chain().find_map(|cause| cause.downcast_ref::<RemoteError>())
}

/// Returns `true` if any cause in the chain is an auth failure.
pub fn is_auth_failure(err: &anyhow::Error) -> bool {
    remote_error(err).is_some_and(RemoteError::is_auth_failure)
}

/// Returns `true` if the failure should not be retried.
pub fn is_permanent(err: &anyhow::Error) -> bool {
    remote_error(err).is_some_and(RemoteError::is_permanent)
}

/// Reasons a generator payload cannot be turned into a [`Question`](crate::model::Question).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generator reported failure")]
    Unsuccessful,

    #[error("generator returned no questions")]
    Empty,

    #[error("question text is missing")]
    MissingText,

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
}
