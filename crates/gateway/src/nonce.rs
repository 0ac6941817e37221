//! Nonce generation and verification for mutating admin actions.
//!
//! Nonces are session-bound, single-use, and time-limited. The admin
//! key screen hands one out alongside the current key; regenerate and
//! test-connection consume it.

use anyhow::{Result, bail};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tower_sessions::Session;

/// Session key for storing issued nonces.
const NONCE_SESSION_KEY: &str = "admin_nonces";

/// Maximum number of outstanding nonces per session.
const MAX_NONCES: usize = 10;

/// Nonce validity period in seconds (1 hour).
const NONCE_VALIDITY_SECS: i64 = 3600;

/// Generate a nonce and store it in the session.
pub async fn generate_nonce(session: &Session) -> Result<String> {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random_bytes);

    let timestamp = chrono::Utc::now().timestamp();

    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hasher.update(timestamp.to_le_bytes());
    let nonce = hex::encode(hasher.finalize());

    // Stored as "nonce:timestamp" so verification can expire entries.
    let entry = format!("{nonce}:{timestamp}");

    let mut nonces: Vec<String> = session
        .get(NONCE_SESSION_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or_default();

    nonces.push(entry);

    // Keep only the most recent MAX_NONCES.
    if nonces.len() > MAX_NONCES {
        let skip = nonces.len() - MAX_NONCES;
        nonces = nonces.into_iter().skip(skip).collect();
    }

    session
        .insert(NONCE_SESSION_KEY, nonces)
        .await
        .map_err(|e| anyhow::anyhow!("failed to store nonce: {}", e))?;

    Ok(nonce)
}

/// Verify a nonce against the session.
///
/// Nonces are single-use: a successful verification removes the entry, so
/// replaying the same value fails.
pub async fn verify_nonce(session: &Session, submitted: &str) -> Result<bool> {
    if submitted.is_empty() {
        bail!("empty nonce");
    }

    let mut nonces: Vec<String> = session
        .get(NONCE_SESSION_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or_default();

    if nonces.is_empty() {
        return Ok(false);
    }

    let now = chrono::Utc::now().timestamp();

    let mut found_index = None;
    for (i, entry) in nonces.iter().enumerate() {
        let Some((nonce, timestamp)) = entry.split_once(':') else {
            continue;
        };

        let timestamp: i64 = match timestamp.parse() {
            Ok(ts) => ts,
            Err(_) => continue,
        };

        if nonce == submitted && now - timestamp <= NONCE_VALIDITY_SECS {
            found_index = Some(i);
            break;
        }
    }

    if let Some(index) = found_index {
        nonces.remove(index);

        // Drop expired entries while we have the list out.
        nonces.retain(|entry| {
            let Some((_, timestamp)) = entry.split_once(':') else {
                return false;
            };
            let timestamp: i64 = timestamp.parse().unwrap_or(0);
            now - timestamp <= NONCE_VALIDITY_SECS
        });

        session
            .insert(NONCE_SESSION_KEY, nonces)
            .await
            .map_err(|e| anyhow::anyhow!("failed to update nonces: {}", e))?;

        return Ok(true);
    }

    Ok(false)
}
