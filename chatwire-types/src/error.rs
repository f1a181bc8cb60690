//! Error types shared by all chatwire backends.

use std::time::Duration;

/// Errors from a [`Backend`](crate::Backend) call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Raw response body text.
        body: String,
    },
    /// A streamed payload was not a valid JSON object.
    #[error("decode error: {0}")]
    Decode(String),
    /// Network-level error (connection reset, DNS failure, body read, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// A complete response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// The HTTP status code, for [`BackendError::Transport`] errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error is likely transient and the request could be retried.
    ///
    /// Nothing in chatwire retries on its own; this is for callers.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Transport { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Decode(_) | Self::InvalidResponse(_) => false,
        }
    }
}
