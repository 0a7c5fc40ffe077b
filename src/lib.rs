pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod session;

use api::create_api_router;
use auth::CookieSettings;
use axum::{Router, http::HeaderName};
use db::Database;
use jwt::{JwtCodec, TokenError};
use rate_limit::RateLimitConfig;
use session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Default login attempts allowed per client per minute.
pub const DEFAULT_LOGIN_RATE_PER_MINUTE: u32 = 10;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Attributes and lifetimes of the auth cookies
    pub cookies: CookieSettings,
    /// Trusted header holding the client address (requires running behind a proxy)
    pub ip_header: Option<HeaderName>,
    /// Login attempts allowed per client per minute
    pub login_rate_per_minute: u32,
    /// Resource routes mounted under `/api` behind the CSRF guard and the request gate
    pub resources: Option<Router>,
}

impl ServerConfig {
    pub fn new(db: Database, jwt_secret: Vec<u8>) -> Self {
        Self {
            db,
            jwt_secret,
            cookies: CookieSettings::default(),
            ip_header: None,
            login_rate_per_minute: DEFAULT_LOGIN_RATE_PER_MINUTE,
            resources: None,
        }
    }
}

/// Create the application router with the given configuration.
///
/// Fails when the signing secret is empty; no route is served without one.
pub fn create_app(config: &ServerConfig) -> Result<Router, TokenError> {
    let jwt = Arc::new(JwtCodec::new(&config.jwt_secret)?);
    let sessions = SessionManager::new(config.db.clone(), jwt);

    let rate_limit = Arc::new(RateLimitConfig::new(
        config.login_rate_per_minute,
        config.ip_header.clone(),
    ));

    let api_router = create_api_router(
        sessions,
        Arc::new(config.cookies.clone()),
        config.ip_header.clone(),
        rate_limit,
        config.resources.clone(),
    );

    Ok(Router::new().nest("/api", api_router))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
