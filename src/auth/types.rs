//! Authentication user types.

use crate::jwt::{AccessClaims, IssuedToken};
use crate::session::AccessTokenRef;

/// The caller of a request that passed the gate.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Verified claims, from the presented token or from the renewed one.
    pub claims: AccessClaims,
    /// The bearer token as presented.
    pub token: String,
    /// Set when the presented token had expired and was renewed.
    pub renewed: Option<IssuedToken>,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> i64 {
        self.claims.user_id
    }

    /// The access token currently valid for this caller, for revocation.
    pub fn current_token(&self) -> AccessTokenRef<'_> {
        match &self.renewed {
            Some(issued) => AccessTokenRef {
                token: &issued.token,
                expires_at: issued.expires_at,
            },
            None => AccessTokenRef {
                token: &self.token,
                expires_at: self.claims.exp,
            },
        }
    }
}
