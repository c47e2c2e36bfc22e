use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for admin service operations
pub type Result<T> = std::result::Result<T, AdminError>;

/// Body returned whenever a core-layer error reaches a route handler
pub const GENERIC_FAILURE: &str = "Something went wrong.";

/// Body returned by routes that answer breaker rejections with a fallback
pub const BREAKER_FALLBACK: &str = "Service temporarily unavailable.";

/// Which aggregate check reported a dependency as unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Health,
    Metrics,
}

/// Admin service error types
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Circuit breaker open: {0}")]
    BreakerOpen(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid form: {0}")]
    InvalidForm(String),

    #[error("{dependency} unavailable")]
    Dependency {
        check: CheckKind,
        dependency: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AdminError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        // Every failure surfaces as a 500, the message is what tells them apart
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// The message placed in the `response` field of the error body
    pub fn public_message(&self) -> String {
        match self {
            AdminError::ServiceUnavailable(_) => BREAKER_FALLBACK.to_string(),
            AdminError::Dependency {
                check: CheckKind::Metrics,
                dependency,
            } => format!("METRIC CHECK FAIL: {} unavailable", dependency),
            AdminError::Dependency {
                check: CheckKind::Health,
                dependency,
            } => format!("Healthcheck fail: {} unavailable", dependency),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::warn!(error = %self, status = status.as_u16(), "Request failed");

        let body = Json(json!({
            "response": self.public_message(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AdminError::UnknownService("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AdminError::BreakerOpen("ad".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_messages_hide_details() {
        let err = AdminError::Transport("connection refused at 10.0.0.5:80".to_string());
        assert_eq!(err.public_message(), GENERIC_FAILURE);

        let err = AdminError::BreakerOpen("database.addgame".to_string());
        assert_eq!(err.public_message(), GENERIC_FAILURE);

        let err = AdminError::ServiceUnavailable("ad".to_string());
        assert_eq!(err.public_message(), BREAKER_FALLBACK);
    }

    #[test]
    fn test_dependency_messages() {
        let err = AdminError::Dependency {
            check: CheckKind::Metrics,
            dependency: "configuration",
        };
        assert_eq!(
            err.public_message(),
            "METRIC CHECK FAIL: configuration unavailable"
        );

        let err = AdminError::Dependency {
            check: CheckKind::Health,
            dependency: "database",
        };
        assert_eq!(err.public_message(), "Healthcheck fail: database unavailable");
    }

    #[test]
    fn test_error_display() {
        let err = AdminError::UnknownService("users".to_string());
        assert_eq!(err.to_string(), "Unknown service: users");
    }
}
