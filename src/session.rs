//! Login, logout and silent renewal.
//!
//! Session states as seen by the server:
//!
//! ```text
//! Anonymous --login--> Authenticated --access token expires--> Expired
//!     ^                                                          |
//!     |            renew ok: back to Authenticated  <------------+
//!     +------ logout / renewal failure (Expired-Terminal) <------+
//! ```
//!
//! Refresh tokens are opaque random strings stored as hashes, one per
//! (user, user agent, origin). Renewal does not rotate them.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{Database, User, UserRole};
use crate::jwt::{AccessClaims, IssuedToken, JwtCodec, TokenError, now_secs};
use crate::password::{self, PasswordError};

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// 32 random bytes, base64url encoded. Used for refresh and CSRF tokens.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Where a login comes from. Forms the refresh token's uniqueness key together
/// with the user id.
#[derive(Debug, Clone, Copy)]
pub struct ClientInfo<'a> {
    pub user_agent: &'a str,
    pub origin: &'a str,
}

/// Everything a successful login hands back to the client.
#[derive(Debug)]
pub struct LoginSession {
    pub user: User,
    pub access: IssuedToken,
    pub refresh_token: String,
    pub csrf_token: String,
}

/// A renewed access token and its verified claims.
#[derive(Debug)]
pub struct Renewal {
    pub issued: IssuedToken,
    pub claims: AccessClaims,
}

/// What logout managed to do. Never surfaced to the client.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogoutReport {
    pub access_revoked: bool,
    pub refresh_deleted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown user, wrong password, inactive account or non-admin role.
    #[error("authentication failed")]
    AuthFailed,
    #[error(transparent)]
    Hashing(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Reasons renewal ends in the terminal state.
#[derive(Debug, thiserror::Error)]
pub enum RenewalError {
    #[error("no refresh token cookie")]
    MissingRefreshToken,
    #[error("expired access token is unreadable")]
    UnreadableAccessToken,
    #[error("refresh token not found")]
    RefreshTokenNotFound,
    #[error("user not found or inactive")]
    UserUnavailable,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Run one step of a multi-step operation whose failure must not stop the rest.
/// Failures are logged and turned into `None`.
pub async fn best_effort<T, E, F>(step: &'static str, fut: F) -> Option<T>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(step, error = %e, "Best-effort step failed");
            None
        }
    }
}

/// Combines the codec and the stores into the session state machine.
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    jwt: Arc<JwtCodec>,
}

impl SessionManager {
    pub fn new(db: Database, jwt: Arc<JwtCodec>) -> Self {
        Self { db, jwt }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn jwt(&self) -> &JwtCodec {
        &self.jwt
    }

    /// Check credentials and open a session for an active admin.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client: ClientInfo<'_>,
    ) -> Result<LoginSession, SessionError> {
        let Some(user) = self.db.users().get_by_username(username).await? else {
            password::verify_password_blocking(
                password.to_string(),
                password::DUMMY_DIGEST.to_string(),
            )
            .await?;
            return Err(SessionError::AuthFailed);
        };

        // The password is checked for every account, known or not, so the
        // response time does not reveal which condition failed.
        let password_ok =
            password::verify_password_blocking(password.to_string(), user.password_hash.clone())
                .await?;
        if !password_ok || !user.is_active || user.role != UserRole::Admin {
            return Err(SessionError::AuthFailed);
        }

        let access = self.jwt.issue(user.id, &user.username, user.role)?;

        let refresh_token = random_token();
        let refresh_expires_at = now_secs()? + REFRESH_TOKEN_DURATION_SECS;
        self.db
            .refresh_tokens()
            .save(
                user.id,
                &refresh_token,
                client.user_agent,
                client.origin,
                refresh_expires_at as i64,
            )
            .await?;

        info!(user_id = user.id, origin = %client.origin, "User logged in");

        Ok(LoginSession {
            user,
            access,
            refresh_token,
            csrf_token: random_token(),
        })
    }

    /// Whether an access token is on the revocation ledger.
    pub async fn is_revoked(&self, token: &str) -> Result<bool, sqlx::Error> {
        // A broken clock counts every ledger entry as live.
        let now = now_secs().unwrap_or(0) as i64;
        self.db.revoked_tokens().is_revoked(token, now).await
    }

    /// Mint a new access token from an expired one plus a refresh token.
    ///
    /// The expired token is read without verification and only tells us whose
    /// refresh token to look up; the refresh token is what actually
    /// authenticates the caller.
    pub async fn renew(
        &self,
        expired_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Renewal, RenewalError> {
        let refresh_token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(RenewalError::MissingRefreshToken)?;

        let hint = self
            .jwt
            .parse_allow_expired(expired_token)
            .map_err(|_| RenewalError::UnreadableAccessToken)?;

        let now = now_secs()? as i64;
        let stored = self
            .db
            .refresh_tokens()
            .find(hint.subject_hint(), refresh_token, now)
            .await?
            .ok_or(RenewalError::RefreshTokenNotFound)?;

        let user = self
            .db
            .users()
            .get_by_id(stored.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(RenewalError::UserUnavailable)?;

        let issued = self.jwt.issue(user.id, &user.username, user.role)?;
        let claims = self.jwt.parse(&issued.token)?;

        info!(user_id = user.id, "Renewed access token");
        Ok(Renewal { issued, claims })
    }

    /// Revoke the bearer token and delete the refresh token. Every step is
    /// best-effort; logout itself always succeeds.
    pub async fn logout(
        &self,
        bearer_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> LogoutReport {
        let mut report = LogoutReport::default();
        let Some(bearer_token) = bearer_token else {
            return report;
        };

        // Only verified tokens go on the ledger; an expired one needs no entry.
        let subject = match self.jwt.parse(bearer_token) {
            Ok(claims) => {
                report.access_revoked = best_effort(
                    "revoke access token",
                    self.db
                        .revoked_tokens()
                        .add(bearer_token, claims.exp as i64),
                )
                .await
                .is_some();
                Some(claims.user_id)
            }
            // Deleting still needs the raw refresh token to match, so an
            // unverified subject is enough to scope it.
            Err(_) => self
                .jwt
                .parse_allow_expired(bearer_token)
                .ok()
                .map(|c| c.subject_hint()),
        };

        if let (Some(user_id), Some(refresh_token)) = (subject, refresh_token) {
            report.refresh_deleted = best_effort(
                "delete refresh token",
                self.db.refresh_tokens().delete(user_id, refresh_token),
            )
            .await
            .unwrap_or(false);
        }

        info!(
            user_id = ?subject,
            access_revoked = report.access_revoked,
            refresh_deleted = report.refresh_deleted,
            "User logged out"
        );
        report
    }

    /// Revoke every refresh token of a user, plus the given access token.
    pub async fn revoke_all(
        &self,
        user_id: i64,
        current: Option<&AccessTokenRef<'_>>,
    ) -> Result<u64, sqlx::Error> {
        let now = now_secs().unwrap_or(0) as i64;
        let revoked = self
            .db
            .refresh_tokens()
            .revoke_all_by_user(user_id, now)
            .await?;

        if let Some(current) = current {
            self.db
                .revoked_tokens()
                .add(current.token, current.expires_at as i64)
                .await?;
        }

        info!(user_id, revoked, "Revoked all sessions");
        Ok(revoked)
    }
}

/// A raw access token together with its verified expiry.
#[derive(Debug, Clone, Copy)]
pub struct AccessTokenRef<'a> {
    pub token: &'a str,
    pub expires_at: u64,
}
