//! Gateway error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Error envelope returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Gateway errors.
///
/// Every variant carries a stable machine code and an HTTP status; messages
/// never expose storage or stack detail.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API key required. Add X-Scrivano-Key header.")]
    MissingKey,

    #[error("API key not configured. Generate one from the admin settings.")]
    NotConfigured,

    #[error("invalid API key")]
    InvalidKey,

    /// No authenticated session.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but lacking the administrator role.
    #[error("unauthorized")]
    Forbidden,

    #[error("invalid or expired nonce")]
    InvalidNonce,

    #[error("title is required")]
    MissingTitle,

    #[error("{0}")]
    PostCreationFailed(String),

    /// The admin connection self-test could not reach the ping endpoint.
    #[error("{0}")]
    ConnectionFailed(String),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("internal server error")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    /// Stable machine-readable code for the JSON envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingKey => "missing_key",
            ApiError::NotConfigured => "not_configured",
            ApiError::InvalidKey => "invalid_key",
            ApiError::Unauthorized | ApiError::Forbidden => "unauthorized",
            ApiError::InvalidNonce => "invalid_nonce",
            ApiError::MissingTitle => "missing_title",
            ApiError::PostCreationFailed(_) => "post_creation_failed",
            ApiError::ConnectionFailed(_) => "connection_failed",
            ApiError::Internal(_) | ApiError::Database(_) => "internal_error",
        }
    }

    /// HTTP status for the variant.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingKey | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidKey | ApiError::Forbidden | ApiError::InvalidNonce => {
                StatusCode::FORBIDDEN
            }
            ApiError::MissingTitle => StatusCode::BAD_REQUEST,
            ApiError::NotConfigured
            | ApiError::PostCreationFailed(_)
            | ApiError::ConnectionFailed(_)
            | ApiError::Internal(_)
            | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
            }
            ApiError::Database(e) => {
                tracing::error!(error = %e, "database error");
            }
            _ => {}
        }

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses_match_the_taxonomy() {
        let cases: Vec<(ApiError, &str, StatusCode)> = vec![
            (ApiError::MissingKey, "missing_key", StatusCode::UNAUTHORIZED),
            (
                ApiError::NotConfigured,
                "not_configured",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::InvalidKey, "invalid_key", StatusCode::FORBIDDEN),
            (
                ApiError::Unauthorized,
                "unauthorized",
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::Forbidden, "unauthorized", StatusCode::FORBIDDEN),
            (
                ApiError::InvalidNonce,
                "invalid_nonce",
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::MissingTitle,
                "missing_title",
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::PostCreationFailed("boom".into()),
                "post_creation_failed",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn internal_errors_never_leak_detail() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused at 10.0.0.3:5432"));
        assert_eq!(err.to_string(), "internal server error");
        assert_eq!(err.code(), "internal_error");
    }
}
