//! Admin key management endpoints.
//!
//! Session-authenticated JSON endpoints for operators: read the current
//! API key, rotate it, and self-test connectivity. The key screen hands
//! out a nonce alongside the key; the mutating actions consume it.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_sessions::Session;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::User;
use crate::nonce::{generate_nonce, verify_nonce};
use crate::routes::auth::SESSION_USER_ID;
use crate::secret;
use crate::state::AppState;

/// Timeout for the connection self-test in seconds.
const PING_TIMEOUT_SECS: u64 = 5;

/// Body for the nonce-protected actions.
#[derive(Debug, Deserialize)]
pub struct NonceBody {
    #[serde(default)]
    pub nonce: String,
}

/// Response for GET /admin/api-key.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub success: bool,
    pub key: String,
    pub nonce: String,
}

/// Response for POST /admin/api-key/regenerate.
#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub success: bool,
    pub key: String,
    pub message: String,
}

/// Response for POST /admin/test-connection.
#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
    pub data: Value,
}

/// GET /admin/api-key
///
/// The current key plus a fresh nonce for the mutating actions.
async fn show_key(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<ApiKeyResponse>> {
    let user_id = session_user(&session).await?;
    require_admin(&state, user_id).await?;

    let key = secret::current(state.db()).await?.unwrap_or_default();
    let nonce = generate_nonce(&session).await?;

    Ok(Json(ApiKeyResponse {
        success: true,
        key,
        nonce,
    }))
}

/// POST /admin/api-key/regenerate
///
/// Rotate the API key. There is no grace period: clients still sending
/// the old key fail on their next request.
async fn regenerate_key(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<NonceBody>,
) -> ApiResult<Json<RegenerateResponse>> {
    let user_id = session_user(&session).await?;
    consume_nonce(&session, &body.nonce).await?;
    require_admin(&state, user_id).await?;

    let key = secret::rotate(state.db()).await?;
    info!(user_id = user_id, "API key regenerated");

    Ok(Json(RegenerateResponse {
        success: true,
        key,
        message: "API key regenerated successfully".to_string(),
    }))
}

/// POST /admin/test-connection
///
/// Server-side GET of the gateway's own ping endpoint, proving that the
/// configured public URL actually reaches this process.
async fn test_connection(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<NonceBody>,
) -> ApiResult<Json<TestConnectionResponse>> {
    let user_id = session_user(&session).await?;
    consume_nonce(&session, &body.nonce).await?;
    require_admin(&state, user_id).await?;

    let ping_url = format!("{}/scrivano/v1/ping", state.site_url());

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(PING_TIMEOUT_SECS))
        .build()
        .unwrap_or_default();

    let response = client
        .get(&ping_url)
        .send()
        .await
        .map_err(|e| ApiError::ConnectionFailed(format!("failed to reach {ping_url}: {e}")))?;

    let data = response.json::<Value>().await.unwrap_or(Value::Null);

    Ok(Json(TestConnectionResponse {
        success: true,
        message: "Connection successful".to_string(),
        data,
    }))
}

/// The authenticated user ID, or `Unauthorized` when there is no session.
async fn session_user(session: &Session) -> Result<i64, ApiError> {
    session
        .get::<i64>(SESSION_USER_ID)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to read session: {e}")))?
        .ok_or(ApiError::Unauthorized)
}

async fn require_admin(state: &AppState, user_id: i64) -> Result<(), ApiError> {
    if User::is_admin(state.db(), user_id).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Nonces are single-use; a second submission of the same value fails.
async fn consume_nonce(session: &Session, submitted: &str) -> Result<(), ApiError> {
    if verify_nonce(session, submitted).await.unwrap_or(false) {
        Ok(())
    } else {
        Err(ApiError::InvalidNonce)
    }
}

/// Create the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/api-key", get(show_key))
        .route("/admin/api-key/regenerate", post(regenerate_key))
        .route("/admin/test-connection", post(test_connection))
}
