//! Scheduled cleanup of expired session rows.
//!
//! Every read already filters on expiry, so this only keeps the tables small.

use crate::db::Database;
use crate::jwt::now_secs;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    let now = match now_secs() {
        Ok(now) => now as i64,
        Err(e) => {
            error!(error = %e, "Skipping cleanup");
            return;
        }
    };

    // Expired or revoked refresh tokens
    match db.refresh_tokens().delete_stale(now).await {
        Ok(count) if count > 0 => info!(count, "Cleaned up stale refresh tokens"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "Failed to clean up refresh tokens"),
    }

    // Ledger rows past the token's own expiry
    match db.revoked_tokens().delete_expired(now).await {
        Ok(count) if count > 0 => info!(count, "Cleaned up expired revocations"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "Failed to clean up revoked access tokens"),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately; startup already ran a pass.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
