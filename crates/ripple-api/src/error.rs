//! API error types.

use thiserror::Error;

/// Errors from the HTTP platform API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The service could not be reached.
    #[error("Service unavailable")]
    Unavailable,

    /// The service answered with a non-success status.
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Transport-level request failure.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(String),

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a reqwest error into timeout/unavailable/other.
    #[must_use]
    pub fn classify(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::Unavailable
        } else {
            ApiError::Request(err)
        }
    }
}
