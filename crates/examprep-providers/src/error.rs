//! Mapping HTTP failures onto [`RemoteError`].

use reqwest::StatusCode;

pub use examprep_core::error::RemoteError;

/// Fallback rate-limit pause when the server sends no `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Classify a transport-level failure.
pub(crate) fn from_transport(err: reqwest::Error, timeout_secs: u64) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(timeout_secs)
    } else {
        RemoteError::NetworkError(err.to_string())
    }
}

/// Turn a non-success response into the matching [`RemoteError`].
///
/// Returns the response unchanged for 2xx statuses.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(RemoteError::RateLimited {
            retry_after_ms: retry_after_secs * 1000,
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(body),
        StatusCode::NOT_FOUND => RemoteError::NotFound(body),
        _ => RemoteError::ApiError {
            status: status.as_u16(),
            message: body,
        },
    })
}
