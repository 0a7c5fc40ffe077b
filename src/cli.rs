//! CLI argument parsing, validation, and startup helpers.

use crate::auth::{CookieSettings, SameSite};
use crate::db::Database;
use crate::jwt::ACCESS_TOKEN_DURATION_SECS;
use crate::session::REFRESH_TOKEN_DURATION_SECS;
use crate::{DEFAULT_LOGIN_RATE_PER_MINUTE, ServerConfig};
use axum::http::HeaderName;
use clap::Parser;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "lunch-menu",
    about = "Lunch menu API with admin sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "lunch_menu.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Trusted header carrying the client address, e.g. x-forwarded-for or x-real-ip.
    /// Only set this when running behind a proxy that overwrites it
    #[arg(long, value_parser = parse_header_name)]
    pub ip_header: Option<HeaderName>,

    /// Domain attribute of the auth cookies
    #[arg(long, env = "COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Path attribute of the auth cookies
    #[arg(long, env = "COOKIE_PATH", default_value = "/")]
    pub cookie_path: String,

    /// Set the Secure flag on cookies (use with HTTPS)
    #[arg(long, env = "COOKIE_SECURE")]
    pub cookie_secure: bool,

    /// HttpOnly flag of the access and refresh cookies. The CSRF cookie is never HttpOnly
    #[arg(long, env = "COOKIE_HTTP_ONLY", default_value_t = true, action = clap::ArgAction::Set)]
    pub cookie_http_only: bool,

    /// SameSite attribute of the auth cookies
    #[arg(long, env = "COOKIE_SAME_SITE", default_value = "strict")]
    pub cookie_same_site: SameSite,

    /// Max-Age of the access token cookie, in seconds
    #[arg(long, default_value_t = ACCESS_TOKEN_DURATION_SECS)]
    pub access_cookie_age: u64,

    /// Max-Age of the refresh token cookie, in seconds
    #[arg(long, default_value_t = REFRESH_TOKEN_DURATION_SECS)]
    pub refresh_cookie_age: u64,

    /// Max-Age of the CSRF cookie, in seconds
    #[arg(long, default_value_t = 3600)]
    pub csrf_cookie_age: u64,

    /// Login attempts allowed per client address per minute
    #[arg(long, default_value_t = DEFAULT_LOGIN_RATE_PER_MINUTE)]
    pub login_rate_per_minute: u32,
}

fn parse_header_name(s: &str) -> Result<HeaderName, String> {
    HeaderName::try_from(s.trim().to_ascii_lowercase())
        .map_err(|e| format!("Invalid header name '{}': {}", s, e))
}

impl Args {
    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            domain: self.cookie_domain.clone().filter(|d| !d.is_empty()),
            path: self.cookie_path.clone(),
            secure: self.cookie_secure,
            http_only: self.cookie_http_only,
            same_site: self.cookie_same_site,
            access_max_age: self.access_cookie_age,
            refresh_max_age: self.refresh_cookie_age,
            csrf_max_age: self.csrf_cookie_age,
        }
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        cookies: args.cookie_settings(),
        ip_header: args.ip_header.clone(),
        login_rate_per_minute: args.login_rate_per_minute,
        resources: None,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
