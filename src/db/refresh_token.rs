//! Refresh token storage.
//!
//! One row per (user, user agent, origin address). Only the SHA-256 of the raw
//! token is stored; the raw value lives in the client's cookie and nowhere else.

use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePool;

/// Placeholder stored when the user agent or origin address is unknown.
pub const UNKNOWN: &str = "unknown";

/// A stored refresh token record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub user_agent: String,
    pub ip_address: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub revoked_at: Option<i64>,
}

/// Store for managing refresh tokens.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

/// Hex-encoded SHA-256 of a raw refresh token.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        UNKNOWN
    } else {
        value
    }
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a refresh token for a device/origin, replacing any previous one.
    ///
    /// The unique index on (user_id, user_agent, ip_address) turns concurrent
    /// logins from the same tuple into a single row; the last write wins.
    pub async fn save(
        &self,
        user_id: i64,
        raw_token: &str,
        user_agent: &str,
        ip_address: &str,
        expires_at: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, user_agent, ip_address, expires_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (user_id, user_agent, ip_address) DO UPDATE SET
                token_hash = excluded.token_hash,
                expires_at = excluded.expires_at,
                revoked_at = NULL",
        )
        .bind(user_id)
        .bind(hash_token(raw_token))
        .bind(or_unknown(user_agent))
        .bind(or_unknown(ip_address))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find a live refresh token for a user.
    ///
    /// Unknown, revoked and expired tokens all come back as `None`; callers
    /// must not try to tell them apart.
    pub async fn find(
        &self,
        user_id: i64,
        raw_token: &str,
        now: i64,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, token_hash, user_agent, ip_address, created_at, expires_at, revoked_at
             FROM refresh_tokens
             WHERE user_id = ? AND token_hash = ? AND revoked_at IS NULL AND expires_at > ?",
        )
        .bind(user_id)
        .bind(hash_token(raw_token))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a user's refresh token. Returns whether a row was removed.
    pub async fn delete(&self, user_id: i64, raw_token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ? AND token_hash = ?")
            .bind(user_id)
            .bind(hash_token(raw_token))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every live refresh token of a user as revoked.
    pub async fn revoke_all_by_user(&self, user_id: i64, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete rows that are expired or revoked.
    pub async fn delete_stale(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE expires_at <= ? OR revoked_at IS NOT NULL",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
