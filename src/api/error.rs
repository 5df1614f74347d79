//! Error taxonomy for backend API calls.
//!
//! Every call either succeeds, fails with an HTTP error carrying the status and
//! the backend's message, fails at the network level (no response at all), or
//! returns a body that does not match the documented schema.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received from the server.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server responded with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body did not match the expected schema.
    #[error("unexpected response from server: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether this error indicates the caller's credentials were rejected.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::Http { status: 401 | 403, .. })
    }

    /// HTTP status code, if the server responded at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_401_and_403() {
        let unauthorized = ApiError::Http {
            status: 401,
            message: "token expired".into(),
        };
        let forbidden = ApiError::Http {
            status: 403,
            message: "not allowed".into(),
        };
        let payment_required = ApiError::Http {
            status: 402,
            message: "card declined".into(),
        };
        assert!(unauthorized.is_auth_error());
        assert!(forbidden.is_auth_error());
        assert!(!payment_required.is_auth_error());
        assert!(!ApiError::InvalidResponse("bad".into()).is_auth_error());
    }

    #[test]
    fn http_error_display_includes_status_and_message() {
        let err = ApiError::Http {
            status: 404,
            message: "Event not found".into(),
        };
        assert_eq!(err.to_string(), "HTTP 404: Event not found");
        assert_eq!(err.status(), Some(404));
    }
}
