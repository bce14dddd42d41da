//! API error handling
//!
//! Every handler returns its own `Result<_, AppError>`; nothing shares an
//! error slot across requests.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use crate::auth::jwt::TokenError;
use ugin_core::UginError;

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", "Invalid request").with_details(details)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Authentication required")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
///
/// `InvalidCredentials`, `InvalidToken`, and `Unauthorized` render the same
/// response so a client cannot tell which check failed.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InvalidCredentials,
    InvalidToken,
    Unauthorized,
    Internal(String),
    Database(String),
    Timeout,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(&msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ApiError::conflict(msg)),
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, ApiError::unauthorized())
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("DATABASE_ERROR", "Database operation failed"),
                )
            }
            AppError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                ApiError::new("TIMEOUT", "Storage did not respond in time"),
            ),
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<UginError> for AppError {
    fn from(err: UginError) -> Self {
        match err {
            UginError::NotFound(msg) => AppError::NotFound(msg),
            UginError::Conflict(msg) => AppError::Conflict(msg),
            UginError::InvalidCredentials => AppError::InvalidCredentials,
            UginError::InvalidToken => AppError::InvalidToken,
            UginError::ValidationError(msg) => AppError::BadRequest(msg),
            UginError::DatabaseError(msg) => AppError::Database(msg),
            UginError::Timeout => AppError::Timeout,
            UginError::ConfigError(msg) => AppError::Internal(format!("Configuration error: {msg}")),
            UginError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(e) => AppError::Internal(format!("Failed to sign token: {e}")),
            TokenError::Invalid | TokenError::WrongKind { .. } => AppError::InvalidToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_auth_failures_are_indistinguishable() {
        let credentials = body_of(AppError::InvalidCredentials).await;
        let token = body_of(AppError::InvalidToken).await;
        let missing = body_of(AppError::Unauthorized).await;

        assert_eq!(credentials.0, StatusCode::UNAUTHORIZED);
        assert_eq!(credentials, token);
        assert_eq!(token, missing);
    }

    #[tokio::test]
    async fn test_database_details_are_not_leaked() {
        let (status, body) = body_of(AppError::Database("relation posts missing".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("relation posts"));
    }

    #[tokio::test]
    async fn test_bad_request_carries_details() {
        let (status, body) = body_of(AppError::BadRequest("password must not be empty".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"], "password must not be empty");
    }

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            AppError::from(UginError::Conflict("x".into())),
            AppError::Conflict(_)
        ));
        assert!(matches!(AppError::from(UginError::Timeout), AppError::Timeout));
        assert!(matches!(
            AppError::from(UginError::NotFound("post 1".into())),
            AppError::NotFound(_)
        ));
    }
}
