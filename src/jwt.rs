//! Access token signing and parsing.
//!
//! Access tokens are HS256-signed JWTs carrying a fixed claim set and a 24 hour
//! lifetime. They are never persisted; the raw string only shows up in the
//! revocation ledger after logout.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::UserRole;

/// Access token lifetime: 24 hours.
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

/// Verified claims of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (database user id)
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Claims read from a token whose signature and expiry were NOT checked.
///
/// Only good as a lookup hint for the refresh token store. There is no way to
/// turn this into [`AccessClaims`].
#[derive(Debug, Clone)]
pub struct UnverifiedClaims(AccessClaims);

impl UnverifiedClaims {
    /// The user id the token claims to belong to.
    pub fn subject_hint(&self) -> i64 {
        self.0.user_id
    }

    /// The expiry the token claims to have.
    pub fn claimed_expiry(&self) -> u64 {
        self.0.exp
    }
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The compact JWT string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Errors from signing or parsing access tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no signing secret configured")]
    SigningUnavailable,
    #[error("malformed token")]
    MalformedToken,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token is expired")]
    Expired,
    #[error("unexpected signing algorithm")]
    UnexpectedAlgorithm,
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("system time error")]
    Clock,
}

/// Signs and parses access tokens with a server-wide HMAC secret.
#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCodec").finish_non_exhaustive()
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::Clock)
}

impl JwtCodec {
    /// Create a codec from the configured secret. An empty secret is refused.
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::SigningUnavailable);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Issue an access token for a user, valid for 24 hours from now.
    pub fn issue(
        &self,
        user_id: i64,
        username: &str,
        role: UserRole,
    ) -> Result<IssuedToken, TokenError> {
        let now = now_secs()?;
        let exp = now + ACCESS_TOKEN_DURATION_SECS;

        let token = self.encode_claims(&AccessClaims {
            user_id,
            username: username.to_string(),
            role,
            iat: now,
            exp,
        })?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
            duration: ACCESS_TOKEN_DURATION_SECS,
        })
    }

    /// Sign an arbitrary claim set with HS256.
    pub fn encode_claims(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Verify signature and expiry, returning the claims.
    pub fn parse(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                    TokenError::UnexpectedAlgorithm
                }
                _ => TokenError::MalformedToken,
            })?;

        // Checked again independently of the library's validation.
        if data.claims.exp < now_secs()? {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    /// Decode the payload without checking signature or expiry.
    ///
    /// Used only by renewal to find which user's refresh token to look up.
    pub fn parse_allow_expired(&self, token: &str) -> Result<UnverifiedClaims, TokenError> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::MalformedToken);
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::MalformedToken)?;
        let claims: AccessClaims =
            serde_json::from_slice(&bytes).map_err(|_| TokenError::MalformedToken)?;

        Ok(UnverifiedClaims(claims))
    }
}
