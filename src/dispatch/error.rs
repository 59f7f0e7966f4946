//! Typed errors for backend dispatch
//!
//! Lets the widget tell a backend that answered badly apart from one it could
//! not reach, without string matching. Neither kind ever reaches the caller of
//! `Widget::send`; both become fixed assistant messages.

use thiserror::Error;

/// Assistant text appended when the backend answers with a non-success status
pub const SERVER_ERROR_TEXT: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// Assistant text appended when the backend cannot be reached or its reply
/// cannot be read
pub const CONNECTION_ERROR_TEXT: &str =
    "Sorry, I encountered an error connecting to the server. Please try again.";

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Backend answered with a non-2xx status
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection refused, DNS failure, reset, etc.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configured request timeout elapsed
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Body was not the expected JSON shape
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl DispatchError {
    /// Status errors are the backend's fault; everything else is the path to it
    pub fn is_server_error(&self) -> bool {
        matches!(self, DispatchError::Status { .. })
    }

    /// Fixed, user-legible text for this failure
    pub fn user_message(&self) -> &'static str {
        if self.is_server_error() {
            SERVER_ERROR_TEXT
        } else {
            CONNECTION_ERROR_TEXT
        }
    }

    pub fn from_http_status(status: reqwest::StatusCode, body: String) -> Self {
        DispatchError::Status {
            status: status.as_u16(),
            body,
        }
    }

    /// Convert reqwest errors into typed DispatchError
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DispatchError::Timeout(e.to_string())
        } else if e.is_decode() {
            DispatchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else {
            DispatchError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_server_text() {
        let err = DispatchError::from_http_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "boom".to_string(),
        );
        assert!(err.is_server_error());
        assert_eq!(err.user_message(), SERVER_ERROR_TEXT);
        assert_eq!(err.to_string(), "Backend returned HTTP 500: boom");
    }

    #[test]
    fn test_transport_kinds_map_to_connection_text() {
        for err in [
            DispatchError::Transport("refused".into()),
            DispatchError::Timeout("30s".into()),
            DispatchError::Decode("missing field `response`".into()),
        ] {
            assert!(!err.is_server_error());
            assert_eq!(err.user_message(), CONNECTION_ERROR_TEXT);
        }
    }

    #[test]
    fn test_texts_differ() {
        assert_ne!(SERVER_ERROR_TEXT, CONNECTION_ERROR_TEXT);
    }
}
