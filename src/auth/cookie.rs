//! Cookie parsing and `Set-Cookie` construction.

use axum::http::header;

use crate::jwt::ACCESS_TOKEN_DURATION_SECS;
use crate::session::REFRESH_TOKEN_DURATION_SECS;

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Cookie name for the double-submit CSRF token.
pub const CSRF_COOKIE_NAME: &str = "csrf_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes shared by the auth cookies, plus a max-age per cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    /// Applies to the access and refresh cookies. The CSRF cookie is never HttpOnly.
    pub http_only: bool,
    pub same_site: SameSite,
    pub access_max_age: u64,
    pub refresh_max_age: u64,
    pub csrf_max_age: u64,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            path: "/".to_string(),
            secure: false,
            http_only: true,
            same_site: SameSite::Strict,
            access_max_age: ACCESS_TOKEN_DURATION_SECS,
            refresh_max_age: REFRESH_TOKEN_DURATION_SECS,
            csrf_max_age: 60 * 60,
        }
    }
}

impl CookieSettings {
    fn build(&self, name: &str, value: &str, max_age: u64, http_only: bool) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            name,
            value,
            self.path,
            max_age,
            self.same_site.as_str()
        );
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn access_cookie(&self, token: &str) -> String {
        self.build(ACCESS_COOKIE_NAME, token, self.access_max_age, self.http_only)
    }

    pub fn refresh_cookie(&self, token: &str) -> String {
        self.build(REFRESH_COOKIE_NAME, token, self.refresh_max_age, self.http_only)
    }

    pub fn csrf_cookie(&self, token: &str) -> String {
        self.build(CSRF_COOKIE_NAME, token, self.csrf_max_age, false)
    }

    /// `Set-Cookie` values that delete all three auth cookies.
    pub fn expired_cookies(&self) -> [String; 3] {
        [
            self.build(ACCESS_COOKIE_NAME, "", 0, self.http_only),
            self.build(REFRESH_COOKIE_NAME, "", 0, self.http_only),
            self.build(CSRF_COOKIE_NAME, "", 0, false),
        ]
    }
}
