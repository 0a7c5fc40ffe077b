//! Double-submit CSRF guard.
//!
//! State-changing requests must carry an `X-CSRF-Token` header equal to the
//! `csrf_token` cookie. Safe methods pass untouched.

use axum::{
    Json,
    extract::Request,
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::debug;

use super::cookie::{CSRF_COOKIE_NAME, get_cookie};

/// Header the client echoes the CSRF cookie in.
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

#[derive(Debug)]
pub struct CsrfError;

impl IntoResponse for CsrfError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Invalid or missing CSRF token",
            }),
        )
            .into_response()
    }
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Check one request. Both values must be present, non-empty and identical.
pub fn check_csrf(method: &Method, headers: &HeaderMap) -> Result<(), CsrfError> {
    if !is_state_changing(method) {
        return Ok(());
    }

    let cookie = get_cookie(headers, CSRF_COOKIE_NAME).filter(|v| !v.is_empty());
    let header = headers
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    match (cookie, header) {
        (Some(cookie), Some(header)) if cookie == header => Ok(()),
        _ => {
            debug!(%method, "CSRF check failed");
            Err(CsrfError)
        }
    }
}

/// Middleware form of [`check_csrf`].
pub async fn require_csrf(req: Request, next: Next) -> Result<Response, CsrfError> {
    check_csrf(req.method(), req.headers())?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    fn headers(cookie: Option<&'static str>, token: Option<&'static str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(cookie) = cookie {
            map.insert(header::COOKIE, HeaderValue::from_static(cookie));
        }
        if let Some(token) = token {
            map.insert(CSRF_HEADER_NAME, HeaderValue::from_static(token));
        }
        map
    }

    #[test]
    fn test_safe_methods_pass() {
        assert!(check_csrf(&Method::GET, &HeaderMap::new()).is_ok());
        assert!(check_csrf(&Method::HEAD, &HeaderMap::new()).is_ok());
        assert!(check_csrf(&Method::OPTIONS, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn test_matching_values_pass() {
        let h = headers(Some("csrf_token=abc"), Some("abc"));
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(check_csrf(&method, &h).is_ok());
        }
    }

    #[test]
    fn test_mismatch_or_absence_rejected() {
        let cases = [
            headers(Some("csrf_token=abc"), Some("abd")),
            headers(Some("csrf_token=abc"), None),
            headers(None, Some("abc")),
            headers(None, None),
            headers(Some("csrf_token="), Some("")),
            headers(Some("csrf_token=abc"), Some("ABC")),
        ];
        for h in &cases {
            assert!(check_csrf(&Method::POST, h).is_err());
        }
    }
}
