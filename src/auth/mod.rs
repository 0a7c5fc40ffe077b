//! Request authentication: bearer access tokens, silent renewal from the
//! refresh token cookie, role checks and the CSRF guard.
//!
//! Access tokens live 24 hours and are checked against the revocation ledger
//! on every request. Refresh tokens (7 days, database-tracked) are only read
//! when an access token has expired.

mod cookie;
mod csrf;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CSRF_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME, SameSite,
    get_cookie,
};
pub use csrf::{CSRF_HEADER_NAME, CsrfError, check_csrf, require_csrf};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, Auth, NEW_ACCESS_TOKEN_HEADER, bearer_token, require_auth};
pub use ip::{HasHeadersAndExtensions, extract_client_ip, extract_user_agent};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
