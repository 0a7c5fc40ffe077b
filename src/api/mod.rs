mod error;
mod users;

use axum::{Router, http::HeaderName, middleware};
use std::sync::Arc;

use crate::auth::{CookieSettings, require_auth, require_csrf};
use crate::impl_has_auth_backend;
use crate::rate_limit::RateLimitConfig;
use crate::session::SessionManager;

pub use error::{ApiError, ApiResponse, ResultExt};
pub use users::UsersState;

/// State of the gate wrapped around mounted resource routes.
#[derive(Clone)]
struct ResourceState {
    sessions: SessionManager,
}

impl_has_auth_backend!(ResourceState);

/// Create the API router.
pub fn create_api_router(
    sessions: SessionManager,
    cookies: Arc<CookieSettings>,
    ip_header: Option<HeaderName>,
    rate_limit: Arc<RateLimitConfig>,
    resources: Option<Router>,
) -> Router {
    let users_state = UsersState {
        sessions: sessions.clone(),
        cookies,
        ip_header,
        rate_limit,
    };

    let router = Router::new().nest("/user", users::router(users_state));

    match resources {
        Some(resources) => router.merge(protect(resources, sessions)),
        None => router,
    }
}

/// Put a router behind the CSRF guard (outer) and the request gate (inner).
pub fn protect(router: Router, sessions: SessionManager) -> Router {
    router
        .route_layer(middleware::from_fn_with_state(
            ResourceState { sessions },
            require_auth::<ResourceState>,
        ))
        .route_layer(middleware::from_fn(require_csrf))
}
