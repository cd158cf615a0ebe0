//! Error types for the campus library client core

use reqwest::StatusCode;
use thiserror::Error;

/// Main client error type
#[derive(Error, Debug)]
pub enum AppError {
    /// No response reached us (DNS, connect, timeout, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response that is not one of the auth statuses below
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A 401 was observed; the session has already been cleared
    #[error("Session expired")]
    SessionExpired,

    /// A 403 was observed; the session is left intact
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AppError {
    /// Build a server error from a status and a raw response body.
    ///
    /// The backend reports failures as `{"message": ...}` or `{"error": ...}`;
    /// anything else is kept verbatim.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        AppError::Server {
            status: status.as_u16(),
            message: extract_message(status, body),
        }
    }

    /// True for errors that mean "the user must (re)authenticate"
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::SessionExpired | AppError::NotAuthenticated | AppError::InvalidCredentials(_)
        )
    }

    /// True when repeating the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_) => true,
            AppError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Pull a human-readable message out of an error body
pub(crate) fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["message", "error"] {
            if let Some(msg) = value.get(field).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AppError::InvalidResponse(e.to_string())
        } else {
            AppError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Storage(format!("Serialization failed: {}", e))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

/// Result type alias for client operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_from_json() {
        let msg = extract_message(StatusCode::BAD_REQUEST, r#"{"message":"Email already used"}"#);
        assert_eq!(msg, "Email already used");

        let msg = extract_message(StatusCode::BAD_REQUEST, r#"{"error":"Bad payload"}"#);
        assert_eq!(msg, "Bad payload");
    }

    #[test]
    fn test_extract_message_fallbacks() {
        assert_eq!(extract_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(extract_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    #[test]
    fn test_retryable() {
        assert!(AppError::Network("timeout".into()).is_retryable());
        assert!(AppError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!AppError::from_status(StatusCode::CONFLICT, "").is_retryable());
        assert!(!AppError::SessionExpired.is_retryable());
        assert!(AppError::SessionExpired.is_auth_failure());
        assert!(!AppError::AccessDenied("nope".into()).is_auth_failure());
    }
}
