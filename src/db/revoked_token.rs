//! Deny-list of access tokens revoked before their natural expiry.

use sqlx::sqlite::SqlitePool;

pub struct RevokedTokenStore {
    pool: SqlitePool,
}

impl RevokedTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a raw access token to the ledger. Adding the same token twice is a no-op.
    pub async fn add(&self, raw_token: &str, expires_at: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO revoked_access_tokens (token, expires_at) VALUES (?, ?)
             ON CONFLICT (token) DO NOTHING",
        )
        .bind(raw_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether the token is on the ledger and has not yet reached its expiry.
    pub async fn is_revoked(&self, raw_token: &str, now: i64) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM revoked_access_tokens WHERE token = ? AND expires_at > ?",
        )
        .bind(raw_token)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Delete entries whose token has expired anyway.
    pub async fn delete_expired(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM revoked_access_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
