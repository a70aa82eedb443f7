use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use time::OffsetDateTime;
use tracing::error;

use crate::users::model::User;

pub const CODE_LEN: usize = 10;

/// Fresh confirmation code; only its hash is ever stored.
pub fn generate() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect()
}

pub fn hash(code: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify(code: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(code.as_bytes(), &parsed)
        .is_ok())
}

/// A code is accepted only while a hash is pending and not yet expired.
pub fn check(user: &User, code: &str, now: OffsetDateTime) -> anyhow::Result<bool> {
    let (Some(hash), Some(expires_at)) = (
        user.confirmation_code_hash.as_deref(),
        user.confirmation_expires_at,
    ) else {
        return Ok(false);
    };
    if now >= expires_at || code.is_empty() {
        return Ok(false);
    }
    verify(code, hash)
}
