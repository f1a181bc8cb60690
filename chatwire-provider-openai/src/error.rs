//! Helpers for mapping HTTP/reqwest failures to [`BackendError`].

use std::time::Duration;

use chatwire_types::BackendError;

/// Timeout reported when the client has no timeout of its own configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Map a non-success HTTP status (and its body) to a [`BackendError`].
///
/// Every non-200 status becomes [`BackendError::Transport`] carrying the raw
/// body; callers classify with [`BackendError::is_retryable`].
pub fn map_http_status(status: reqwest::StatusCode, body: &str) -> BackendError {
    BackendError::Transport {
        status: status.as_u16(),
        body: body.to_string(),
    }
}

/// Map a [`reqwest::Error`] to a [`BackendError`].
///
/// `timeout` is the timeout the request was sent with; a timeout error
/// reports it, or [`DEFAULT_TIMEOUT`] when none was set.
pub fn map_reqwest_error(err: reqwest::Error, timeout: Option<Duration>) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
    } else {
        BackendError::Network(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_404_keeps_status_and_body() {
        let err = map_http_status(reqwest::StatusCode::NOT_FOUND, "Model not found");
        match err {
            BackendError::Transport { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "Model not found");
            }
            other => panic!("expected Transport, got: {other:?}"),
        }
    }

    #[test]
    fn map_401_is_not_retryable() {
        let err = map_http_status(reqwest::StatusCode::UNAUTHORIZED, "Invalid API key");
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_retryable());
    }

    #[test]
    fn map_429_is_retryable() {
        let err = map_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
        assert!(err.is_retryable());
    }

    #[test]
    fn map_502_is_retryable() {
        let err = map_http_status(reqwest::StatusCode::BAD_GATEWAY, "Bad gateway");
        assert!(err.is_retryable());
    }

    #[test]
    fn empty_body_preserved() {
        let err = map_http_status(reqwest::StatusCode::BAD_REQUEST, "");
        assert!(matches!(err, BackendError::Transport { status: 400, ref body } if body.is_empty()));
    }
}
