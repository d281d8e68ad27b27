//! Error types for the remote collaborators.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to a remote service.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The service asked us to slow down (HTTP 429).
    #[error("rate limited (HTTP 429)")]
    RateLimited {
        /// Wait requested through `Retry-After`, if any.
        retry_after: Option<Duration>,
    },

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request could not be sent or the response not read.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A required credential or endpoint is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),
}

impl RemoteError {
    /// Whether the error is a rate-limit signal worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }

    /// Wait requested by the server, when the error is a rate limit.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        let limited = RemoteError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert!(limited.is_rate_limited());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));

        let status = RemoteError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(!status.is_rate_limited());
        assert_eq!(status.retry_after(), None);
    }
}
