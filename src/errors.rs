use std::time::Duration;

use thiserror::Error;

/// Classified outcome of a single failed transport attempt (relay or direct).
///
/// Every variant is recovered locally by the resolver: it is logged and the
/// chain moves on to the next transport.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("wrong content type: received an HTML document instead of JSON")]
    WrongContentType,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl AttemptError {
    /// Short machine-friendly label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Transport(_) => "transport_error",
            AttemptError::Timeout(_) => "timeout",
            AttemptError::WrongContentType => "wrong_content_type",
            AttemptError::MalformedPayload(_) => "malformed_payload",
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(e: reqwest::Error) -> Self {
        AttemptError::Transport(e.to_string())
    }
}

/// Errors that can end a gateway call. Converted into a failed
/// [`ApiEnvelope`](crate::envelope::ApiEnvelope) at the facade boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("backend request failed: {0}")]
    DirectFailed(AttemptError),

    #[error("all {attempted} relay proxies failed")]
    AllProxiesExhausted { attempted: usize },

    #[error("backend unreachable: all {attempted} relay proxies failed; direct request failed: {direct}")]
    BackendUnreachable {
        attempted: usize,
        direct: AttemptError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_reports_millis() {
        let err = AttemptError::Timeout(Duration::from_millis(2500));
        assert_eq!(err.to_string(), "no response within 2500ms");
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_backend_unreachable_names_direct_cause() {
        let err = GatewayError::BackendUnreachable {
            attempted: 3,
            direct: AttemptError::Transport("connection refused".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("all 3 relay proxies failed"), "got: {}", msg);
        assert!(msg.contains("connection refused"), "got: {}", msg);
    }

    #[test]
    fn test_exhaustion_does_not_enumerate_causes() {
        let err = GatewayError::AllProxiesExhausted { attempted: 2 };
        assert_eq!(err.to_string(), "all 2 relay proxies failed");
    }
}
