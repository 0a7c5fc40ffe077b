//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Internal auth error kind used by the request gate and extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingBearer,
    TokenRevoked,
    InvalidToken,
    RenewalFailed,
    NotAuthenticated,
    InsufficientRole,
    DatabaseError,
}

/// API authentication errors, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::MissingBearer
            | AuthErrorKind::TokenRevoked
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::RenewalFailed
            | AuthErrorKind::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::MissingBearer => "Missing or invalid Authorization header",
            AuthErrorKind::TokenRevoked => "Token has been revoked",
            AuthErrorKind::InvalidToken => "Invalid or expired token",
            AuthErrorKind::RenewalFailed => "Invalid or expired refresh token",
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InsufficientRole => "Admin access required",
            AuthErrorKind::DatabaseError => "Database error",
        }
    }

    fn reason(&self) -> Option<&'static str> {
        match self.kind {
            AuthErrorKind::TokenRevoked => Some("revoked"),
            AuthErrorKind::RenewalFailed => Some("expired"),
            _ => None,
        }
    }
}

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<&'static str>,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
                reason: self.reason(),
            }),
        )
            .into_response()
    }
}
