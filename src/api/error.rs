//! Shared error handling for API endpoints.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
///
/// Each variant carries a stable machine code and a human message.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str, String),
    Unauthorized(&'static str, String),
    NotFound(String),
    Internal(&'static str, String),
}

impl ApiError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::BadRequest("INVALID_INPUT", msg.into())
    }

    pub fn validation_failed(fields: &[&str]) -> Self {
        Self::BadRequest(
            "VALIDATION_FAILED",
            format!("Invalid fields: {}", fields.join(", ")),
        )
    }

    pub fn registration_failed(msg: impl Into<String>) -> Self {
        Self::BadRequest("REGISTRATION_FAILED", msg.into())
    }

    /// The same response for every login failure.
    pub fn auth_failed() -> Self {
        Self::Unauthorized("AUTH_FAILED", "Invalid credentials".into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, "{}", context);
        Self::Internal("DB_ERROR", "Database error".into())
    }

    pub fn hash_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, "{}", context);
        Self::Internal("HASH_ERROR", "Failed to hash password".into())
    }

    pub fn token_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, "{}", context);
        Self::Internal("TOKEN_ERROR", "Failed to generate access token".into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(code, _)
            | ApiError::Unauthorized(code, _)
            | ApiError::Internal(code, _) => *code,
            ApiError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_input(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    error: &'static str,
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    message: &'a str,
    error: ErrorDetail<'a>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            ApiError::BadRequest(_, msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(_, msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(_, msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (
            status,
            Json(ErrorResponse {
                message,
                error: ErrorDetail {
                    error: code,
                    message,
                },
            }),
        )
            .into_response()
    }
}

/// Standard success envelope: `{message, data?}`.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: &'static str, data: T) -> Self {
        Self {
            message,
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: &'static str) -> Self {
        Self {
            message,
            data: None,
        }
    }
}
