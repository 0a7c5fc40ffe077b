//! Password hashing and verification.
//!
//! Argon2id with the crate's default parameters (19 MiB, 2 passes), which puts
//! a verification in the tens-to-hundreds of milliseconds on commodity hardware.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Errors from the password hasher. A mismatch is not an error.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    HashingFailed(String),
}

/// Well-formed Argon2id digest that matches no password. Verified against
/// when a login names an unknown user, so that path costs the same.
pub const DUMMY_DIGEST: &str = "$argon2id$v=19$m=19456,t=2,p=1$bHVuY2gtbWVudS1zYWx0IQ$LX/QWS5WNDoKCvByQpcy3hBUhezZ9iodfh/xIYS2qLg";

/// Hash a plaintext password into a PHC string suitable for storage.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Check a plaintext password against a stored digest.
///
/// Returns `Ok(false)` on mismatch. A digest that cannot be parsed is also
/// treated as a mismatch, so a corrupted row never authenticates.
pub fn verify_password(plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return Ok(false);
    };

    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::HashingFailed(e.to_string())),
    }
}

/// [`hash_password`] on the blocking thread pool.
pub async fn hash_password_blocking(plaintext: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext))
        .await
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
}

/// [`verify_password`] on the blocking thread pool.
pub async fn verify_password_blocking(
    plaintext: String,
    digest: String,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&plaintext, &digest))
        .await
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
}
