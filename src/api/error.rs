//! API Error Types
//!
//! Classifies every failure of a call against the remote FitManager API
//! into one of three kinds the presentation layer reacts to differently:
//! transport (generic retry message), validation (field message, form kept)
//! and authentication (session cleared, back to login).

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by calls against the remote API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network failure, unreachable host, or an undecodable body
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status that is not otherwise classified
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// The remote store rejected the submitted payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// 401 on an authenticated call, or failed credential verification
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An authenticated call was attempted without a session token
    #[error("Not logged in")]
    NotLoggedIn,
}

/// Coarse error classes from the error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Validation,
    Authentication,
}

impl ApiError {
    /// Build an error from a non-success response status and body
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            401 => ApiError::Authentication(if message.is_empty() {
                "unauthorized".to_string()
            } else {
                message
            }),
            400 | 422 => ApiError::Validation(message),
            other => ApiError::Status {
                status: other,
                message,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) | ApiError::Status { .. } => ErrorKind::Transport,
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Authentication(_) | ApiError::NotLoggedIn => ErrorKind::Authentication,
        }
    }

    /// True when the error must end the current session
    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    /// Message suitable for showing next to a form
    ///
    /// `subject` names what was submitted ("weight", "values") and is only
    /// used for validation failures.
    pub fn user_message(&self, subject: &str) -> String {
        match self.kind() {
            ErrorKind::Validation => format!("Invalid {}. Please try again.", subject),
            ErrorKind::Authentication => "Your session has expired. Please log in again.".to_string(),
            ErrorKind::Transport => "Something went wrong. Please try later.".to_string(),
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, String::new());
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.is_auth());

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, "weight must be positive".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Validation error: weight must be positive");

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "API error 500: boom");
    }

    #[test]
    fn test_user_messages() {
        let err = ApiError::Validation("bad".into());
        assert_eq!(err.user_message("weight"), "Invalid weight. Please try again.");

        let err = ApiError::Status {
            status: 503,
            message: String::new(),
        };
        assert_eq!(err.user_message("weight"), "Something went wrong. Please try later.");

        assert!(ApiError::NotLoggedIn.is_auth());
    }
}
