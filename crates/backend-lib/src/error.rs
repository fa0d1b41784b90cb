// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The one message every failed login gets, whatever the cause
pub const GENERIC_LOGIN_FAILURE: &str = "Incorrect username or password";

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown user or wrong password; never distinguished
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Username {0} already exists")]
    UsernameTaken(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::InvalidToken(_)
            | AppError::ExpiredToken
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UsernameTaken(_) => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigurationMissing(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "AUTH_001",
            AppError::InvalidToken(_) => "AUTH_002",
            AppError::ExpiredToken => "AUTH_003",
            AppError::Unauthorized => "AUTH_004",
            AppError::Forbidden => "AUTH_005",
            AppError::ConfigurationMissing(_) => "CFG_001",
            AppError::StorageUnavailable(_) => "STORE_001",
            AppError::UsernameTaken(_) => "USER_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => GENERIC_LOGIN_FAILURE.to_string(),
            AppError::InvalidToken(_) | AppError::ExpiredToken | AppError::Unauthorized => {
                "Authentication failed".to_string()
            },
            AppError::Forbidden => "Insufficient permissions".to_string(),
            AppError::UsernameTaken(_) => "Username is already taken".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::StorageUnavailable(_) => {
                "Service temporarily unavailable, please try again later".to_string()
            },
            AppError::ConfigurationMissing(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Json(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {err}"))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
