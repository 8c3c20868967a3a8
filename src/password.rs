//! Password hashing for stored admin, student and faculty credentials.
//!
//! Encoded form: `pbkdf2-sha256$<iterations>$<salt b64>$<hash b64>`.

use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

const SCHEME: &str = "pbkdf2-sha256";
pub const SALT_LENGTH: usize = 16;
pub const HASH_LENGTH: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PasswordError {
    #[error("stored password hash is malformed")]
    Malformed,
    #[error("password hashing task failed: {0}")]
    Task(String),
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Hash a password with a fresh random salt.
pub fn hash(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(password, &salt, iterations);

    format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    )
}

/// Check a password against an encoded hash in constant time.
pub fn verify(password: &str, encoded: &str) -> Result<bool, PasswordError> {
    let mut parts = encoded.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(PasswordError::Malformed);
    };

    let iterations: u32 = iterations.parse().map_err(|_| PasswordError::Malformed)?;
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| PasswordError::Malformed)?;
    let expected = STANDARD_NO_PAD
        .decode(expected)
        .map_err(|_| PasswordError::Malformed)?;

    let actual = derive(password, &salt, iterations);
    Ok(actual.as_slice().ct_eq(expected.as_slice()).into())
}

/// [`hash`] on the blocking pool.
pub async fn hash_blocking(password: String, iterations: u32) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash(&password, iterations))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))
}

/// [`verify`] on the blocking pool.
pub async fn verify_blocking(password: String, encoded: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify(&password, &encoded))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
}
