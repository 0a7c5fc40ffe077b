//! User and session endpoints.
//!
//! - POST `/register` - Create an account
//! - POST `/login` - Password login, sets the three auth cookies
//! - POST `/logout` - Revoke the bearer token, delete the refresh token, expire cookies
//! - GET `/me` - Claims of the current access token
//! - DELETE `/sessions` - Revoke every session of the caller
//! - DELETE `/{id}/sessions` - Revoke every session of a user (admin)

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, StatusCode, header::SET_COOKIE, request::Parts},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResponse, ResultExt};
use crate::auth::{
    AdminOnly, Auth, CookieSettings, REFRESH_COOKIE_NAME, bearer_token, extract_client_ip,
    extract_user_agent, get_cookie, require_auth, require_csrf,
};
use crate::db::{NewUser, SafeUser, UserRole, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::AccessClaims;
use crate::password;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};
use crate::session::{ClientInfo, SessionError, SessionManager, random_token};

#[derive(Clone)]
pub struct UsersState {
    pub sessions: SessionManager,
    pub cookies: Arc<CookieSettings>,
    pub ip_header: Option<HeaderName>,
    pub rate_limit: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_login,
        ));

    let protected_router = Router::new()
        .route("/me", get(me))
        .route("/sessions", delete(revoke_own_sessions))
        .route("/{id}/sessions", delete(revoke_user_sessions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<UsersState>,
        ))
        .route_layer(middleware::from_fn(require_csrf));

    Router::new()
        .route("/register", post(register))
        .route("/logout", post(logout))
        .merge(login_router)
        .merge(protected_router)
        .with_state(state)
}

/// User agent and origin address of the caller.
struct ClientContext {
    user_agent: String,
    origin: String,
}

impl FromRequestParts<UsersState> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &UsersState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientContext {
            user_agent: extract_user_agent(parts).to_string(),
            origin: extract_client_ip(parts, state.ip_header.as_ref()),
        })
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    /// Carries the plaintext password.
    password_hash: String,
    email: String,
    role: String,
}

#[derive(Serialize)]
struct RegisterData {
    user: SafeUser,
    csrf_token: String,
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
}

async fn register(
    State(state): State<UsersState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let username = payload.username.trim();

    let mut invalid = Vec::new();
    if username.is_empty() {
        invalid.push("username");
    }
    if payload.password_hash.is_empty() {
        invalid.push("password_hash");
    }
    if !is_valid_email(&payload.email) {
        invalid.push("email");
    }
    let role = UserRole::parse(&payload.role);
    if role.is_none() {
        invalid.push("role");
    }
    let Some(role) = role.filter(|_| invalid.is_empty()) else {
        return Err(ApiError::validation_failed(&invalid));
    };

    let hash = password::hash_password_blocking(payload.password_hash)
        .await
        .map_err(|e| ApiError::hash_error("Failed to hash password", e))?;

    let user = state
        .sessions
        .db()
        .users()
        .create(&NewUser {
            username,
            password_hash: &hash,
            email: &payload.email,
            role,
            is_active: true,
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::registration_failed("Username or email already exists")
            } else {
                ApiError::db_error("Failed to create user", e)
            }
        })?;

    tracing::info!(user_id = user.id, role = role.as_str(), "User registered");

    let csrf_token = random_token();
    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, state.cookies.csrf_cookie(&csrf_token))]),
        Json(ApiResponse::new(
            "User registered successfully",
            RegisterData {
                user: user.to_safe(),
                csrf_token,
            },
        )),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    /// Carries the plaintext password.
    password_hash: String,
}

#[derive(Serialize)]
struct LoginData {
    user: SafeUser,
    token: String,
}

async fn login(
    State(state): State<UsersState>,
    client: ClientContext,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    if payload.username.is_empty() || payload.password_hash.is_empty() {
        return Err(ApiError::invalid_input(
            "username and password_hash are required",
        ));
    }

    let session = state
        .sessions
        .login(
            &payload.username,
            &payload.password_hash,
            ClientInfo {
                user_agent: &client.user_agent,
                origin: &client.origin,
            },
        )
        .await
        .map_err(|e| match e {
            SessionError::AuthFailed => ApiError::auth_failed(),
            SessionError::Hashing(e) => ApiError::hash_error("Failed to verify password", e),
            SessionError::Token(e) => ApiError::token_error("Failed to issue access token", e),
            SessionError::Storage(e) => ApiError::db_error("Failed to save refresh token", e),
        })?;

    let cookies = AppendHeaders([
        (SET_COOKIE, state.cookies.access_cookie(&session.access.token)),
        (SET_COOKIE, state.cookies.refresh_cookie(&session.refresh_token)),
        (SET_COOKIE, state.cookies.csrf_cookie(&session.csrf_token)),
    ]);

    Ok((
        cookies,
        Json(ApiResponse::new(
            "Login successful",
            LoginData {
                user: session.user.to_safe(),
                token: session.access.token,
            },
        )),
    ))
}

/// Always succeeds. Revocation steps are best-effort.
async fn logout(State(state): State<UsersState>, headers: HeaderMap) -> impl IntoResponse {
    state
        .sessions
        .logout(
            bearer_token(&headers),
            get_cookie(&headers, REFRESH_COOKIE_NAME),
        )
        .await;

    let [access, refresh, csrf] = state.cookies.expired_cookies();
    (
        AppendHeaders([
            (SET_COOKIE, access),
            (SET_COOKIE, refresh),
            (SET_COOKIE, csrf),
        ]),
        Json(ApiResponse::message("Logged out successfully")),
    )
}

async fn me(Auth(user): Auth) -> Json<ApiResponse<AccessClaims>> {
    Json(ApiResponse::new("Authenticated", user.claims))
}

#[derive(Serialize)]
struct RevokedData {
    revoked: u64,
}

async fn revoke_own_sessions(
    State(state): State<UsersState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state
        .sessions
        .revoke_all(user.user_id(), Some(&user.current_token()))
        .await
        .db_err("Failed to revoke sessions")?;

    Ok(Json(ApiResponse::new(
        "Sessions revoked",
        RevokedData { revoked },
    )))
}

async fn revoke_user_sessions(
    State(state): State<UsersState>,
    AdminOnly(admin): AdminOnly,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .sessions
        .db()
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let revoked = state
        .sessions
        .revoke_all(id, None)
        .await
        .db_err("Failed to revoke sessions")?;

    tracing::info!(admin_id = admin.user_id(), user_id = id, revoked, "Admin revoked sessions");

    Ok(Json(ApiResponse::new(
        "Sessions revoked",
        RevokedData { revoked },
    )))
}
