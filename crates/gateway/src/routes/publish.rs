//! The publish endpoint.

use axum::Json;
use axum::extract::State;

use crate::error::ApiResult;
use crate::services::{PublishRequest, PublishResponse};
use crate::state::AppState;

/// POST /publish
///
/// Create a post from an authenticated publish payload. All pipeline
/// behavior lives in [`crate::services::PublishService`]; this handler
/// only moves the payload across the HTTP boundary.
pub async fn publish(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<Json<PublishResponse>> {
    let response = state.publisher().publish(request).await?;

    Ok(Json(response))
}
