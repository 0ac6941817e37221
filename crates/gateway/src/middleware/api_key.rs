//! Shared-secret authentication middleware.
//!
//! Publishing clients authenticate every request with the gateway API key
//! carried in a custom header. The current namespace reads `X-Scrivano-Key`
//! only; the legacy namespace also honors the deprecated `X-Writer-Key` when
//! the current header is absent or empty. Comparison against the stored key
//! is constant-time in both cases.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::secret;
use crate::state::AppState;

/// Request header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Scrivano-Key";

/// Deprecated header still honored on the legacy namespace.
pub const LEGACY_API_KEY_HEADER: &str = "X-Writer-Key";

/// How a namespace reports key problems.
#[derive(Debug, Clone, Copy)]
enum KeyPolicy {
    /// Distinguishes a missing client key, an unconfigured gateway, and a
    /// mismatch.
    Current,
    /// Collapses "no key sent" and "no key stored" into a missing key,
    /// matching what legacy clients have always seen.
    Legacy,
}

/// Require a valid API key on the current namespace.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = header_value(&request, API_KEY_HEADER);

    match verify(&state, provided, KeyPolicy::Current).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

/// Require a valid API key on the legacy namespace, reading the deprecated
/// header as a fallback.
pub async fn require_api_key_legacy(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = header_value(&request, API_KEY_HEADER)
        .filter(|v| !v.is_empty())
        .or_else(|| header_value(&request, LEGACY_API_KEY_HEADER));

    match verify(&state, provided, KeyPolicy::Legacy).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

fn header_value<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Read the stored key fresh from settings, so a rotation takes effect on
/// the very next request, and check the provided key against it.
async fn verify(state: &AppState, provided: Option<&str>, policy: KeyPolicy) -> Result<(), ApiError> {
    let stored = secret::current(state.db()).await?.unwrap_or_default();

    evaluate(provided.unwrap_or(""), &stored, policy)
}

fn evaluate(provided: &str, stored: &str, policy: KeyPolicy) -> Result<(), ApiError> {
    match policy {
        KeyPolicy::Current => {
            if provided.is_empty() {
                return Err(ApiError::MissingKey);
            }
            if stored.is_empty() {
                return Err(ApiError::NotConfigured);
            }
        }
        KeyPolicy::Legacy => {
            if provided.is_empty() || stored.is_empty() {
                return Err(ApiError::MissingKey);
            }
        }
    }

    if bool::from(provided.as_bytes().ct_eq(stored.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::InvalidKey)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn matching_keys_pass_under_both_policies() {
        assert!(evaluate("secret", "secret", KeyPolicy::Current).is_ok());
        assert!(evaluate("secret", "secret", KeyPolicy::Legacy).is_ok());
    }

    #[test]
    fn mismatch_is_invalid_key() {
        for policy in [KeyPolicy::Current, KeyPolicy::Legacy] {
            let err = evaluate("aaaa", "bbbb", policy).unwrap_err();
            assert!(matches!(err, ApiError::InvalidKey));
        }

        // Length differences are still just a mismatch.
        let err = evaluate("short", "a-much-longer-key", KeyPolicy::Current).unwrap_err();
        assert!(matches!(err, ApiError::InvalidKey));
    }

    #[test]
    fn current_policy_separates_missing_from_unconfigured() {
        assert!(matches!(
            evaluate("", "stored", KeyPolicy::Current).unwrap_err(),
            ApiError::MissingKey
        ));
        assert!(matches!(
            evaluate("provided", "", KeyPolicy::Current).unwrap_err(),
            ApiError::NotConfigured
        ));
        assert!(matches!(
            evaluate("", "", KeyPolicy::Current).unwrap_err(),
            ApiError::MissingKey
        ));
    }

    #[test]
    fn legacy_policy_reports_missing_key_either_way() {
        assert!(matches!(
            evaluate("", "stored", KeyPolicy::Legacy).unwrap_err(),
            ApiError::MissingKey
        ));
        assert!(matches!(
            evaluate("provided", "", KeyPolicy::Legacy).unwrap_err(),
            ApiError::MissingKey
        ));
    }
}
