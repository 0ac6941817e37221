//! Shared-secret management for the publish gateway.
//!
//! The gateway authenticates callers with a single site-wide secret kept
//! in the settings table. The raw value is stored so the admin screen can
//! redisplay it; request headers are compared against it in constant time
//! (see `middleware::api_key`).

use anyhow::Result;
use sqlx::PgPool;

use crate::models::Setting;

/// Settings key holding the gateway secret.
pub const SECRET_KEY: &str = "api_secret";

/// Generate a 32-byte random hex secret.
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// The currently configured secret, if any.
///
/// An empty stored value counts as unconfigured.
pub async fn current(pool: &PgPool) -> Result<Option<String>> {
    let value = Setting::get_string(pool, SECRET_KEY).await?;
    Ok(value.filter(|v| !v.is_empty()))
}

/// Ensure a secret exists, generating one on first boot.
///
/// Returns `true` when a fresh secret was created.
pub async fn ensure(pool: &PgPool) -> Result<bool> {
    if current(pool).await?.is_some() {
        return Ok(false);
    }

    Setting::set_string(pool, SECRET_KEY, &generate_secret()).await?;
    Ok(true)
}

/// Replace the secret with a fresh one.
///
/// The old value stops authenticating as soon as the write commits.
pub async fn rotate(pool: &PgPool) -> Result<String> {
    let secret = generate_secret();
    Setting::set_string(pool, SECRET_KEY, &secret).await?;
    Ok(secret)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_generation() {
        let s1 = generate_secret();
        let s2 = generate_secret();
        assert_ne!(s1, s2);
        assert_eq!(s1.len(), 64);
        assert!(s1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
