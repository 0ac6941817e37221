//! Author listing endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::error::ApiResult;
use crate::models::User;
use crate::state::AppState;

/// One row of the authors listing.
#[derive(Debug, Serialize)]
pub struct AuthorRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Envelope for GET /authors.
#[derive(Debug, Serialize)]
pub struct AuthorsResponse {
    pub success: bool,
    pub authors: Vec<AuthorRow>,
    pub total: usize,
}

/// GET /authors
///
/// Users holding a publishing role, ordered by display name, with every
/// role the account has joined into one string.
pub async fn list_authors(State(state): State<AppState>) -> ApiResult<Json<AuthorsResponse>> {
    let entries = User::list_authors(state.db()).await?;

    let authors: Vec<AuthorRow> = entries
        .into_iter()
        .map(|entry| AuthorRow {
            id: entry.id,
            name: entry.display,
            email: entry.mail,
            role: entry.roles.unwrap_or_default(),
        })
        .collect();

    Ok(Json(AuthorsResponse {
        success: true,
        total: authors.len(),
        authors,
    }))
}
