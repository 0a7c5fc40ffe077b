//! The request gate middleware and the extractors that read its result.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use super::cookie::{REFRESH_COOKIE_NAME, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::db::UserRole;
use crate::jwt::TokenError;
use crate::session::{RenewalError, SessionManager};

/// Response header carrying a silently renewed access token.
pub const NEW_ACCESS_TOKEN_HEADER: &str = "x-new-access-token";

/// The token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Header shape, then the revocation ledger, then strict parsing. An expired
/// token is renewed from the refresh token cookie.
async fn authenticate_request(
    sessions: &SessionManager,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AuthErrorKind> {
    let token = bearer_token(headers).ok_or(AuthErrorKind::MissingBearer)?;

    let revoked = sessions.is_revoked(token).await.map_err(|e| {
        error!(error = %e, "Failed to check revocation ledger");
        AuthErrorKind::DatabaseError
    })?;
    if revoked {
        return Err(AuthErrorKind::TokenRevoked);
    }

    match sessions.jwt().parse(token) {
        Ok(claims) => Ok(AuthenticatedUser {
            claims,
            token: token.to_string(),
            renewed: None,
        }),
        Err(TokenError::Expired) => {
            let refresh = get_cookie(headers, REFRESH_COOKIE_NAME);
            match sessions.renew(token, refresh).await {
                Ok(renewal) => Ok(AuthenticatedUser {
                    claims: renewal.claims,
                    token: token.to_string(),
                    renewed: Some(renewal.issued),
                }),
                Err(RenewalError::Storage(e)) => {
                    error!(error = %e, "Storage failure during renewal");
                    Err(AuthErrorKind::RenewalFailed)
                }
                Err(e) => {
                    debug!(error = %e, "Renewal refused");
                    Err(AuthErrorKind::RenewalFailed)
                }
            }
        }
        Err(e) => {
            debug!(error = %e, "Rejected access token");
            Err(AuthErrorKind::InvalidToken)
        }
    }
}

/// Middleware guarding every protected route.
///
/// On success the [`AuthenticatedUser`] is stored in the request extensions.
/// When the token was renewed, the new one goes out in `X-New-Access-Token`.
pub async fn require_auth<S>(
    State(state): State<S>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiAuthError>
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let user = authenticate_request(state.sessions(), req.headers())
        .await
        .map_err(ApiAuthError::from)?;

    let new_token = user.renewed.as_ref().map(|issued| issued.token.clone());
    req.extensions_mut().insert(user);

    let mut response = next.run(req).await;
    if let Some(token) = new_token {
        if let Ok(value) = HeaderValue::from_str(&token) {
            response
                .headers_mut()
                .insert(NEW_ACCESS_TOKEN_HEADER, value);
        }
    }
    Ok(response)
}

/// Extractor for the caller of a gated route.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Auth)
            .ok_or(ApiAuthError::new(AuthErrorKind::NotAuthenticated))
    }
}

/// Like [`Auth`], but the verified role must be admin.
pub struct AdminOnly(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;
        if user.claims.role != UserRole::Admin {
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }
        Ok(AdminOnly(user))
    }
}
