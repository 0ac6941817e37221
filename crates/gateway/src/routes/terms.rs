//! Category and tag listing endpoints.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::models::Term;
use crate::state::AppState;

/// Number of tags returned when the caller does not say how many.
const DEFAULT_TAG_LIMIT: i64 = 100;

/// Hard ceiling on the tag listing size.
const MAX_TAG_LIMIT: i64 = 500;

/// One row of the categories listing.
#[derive(Debug, Serialize)]
pub struct CategoryEntry {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub count: i64,
    pub parent: i64,
    pub link: String,
}

/// Envelope for GET /categories.
#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub success: bool,
    pub categories: Vec<CategoryEntry>,
    pub total: usize,
}

/// One row of the tags listing.
#[derive(Debug, Serialize)]
pub struct TagEntry {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub count: i64,
    pub link: String,
}

/// Envelope for GET /tags.
#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub success: bool,
    pub tags: Vec<TagEntry>,
    pub total: usize,
}

/// Query parameters for GET /tags.
#[derive(Debug, Deserialize)]
pub struct TagsQuery {
    pub limit: Option<i64>,
}

/// GET /categories
///
/// Every category, busiest first, empty ones included.
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<CategoriesResponse>> {
    let rows = Term::list_categories(state.db()).await?;

    let categories: Vec<CategoryEntry> = rows
        .into_iter()
        .map(|row| CategoryEntry {
            link: format!("{}/category/{}", state.site_url(), row.slug),
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            count: row.count,
            parent: row.parent_id.unwrap_or(0),
        })
        .collect();

    Ok(Json(CategoriesResponse {
        success: true,
        total: categories.len(),
        categories,
    }))
}

/// GET /tags?limit=N
///
/// The most-used tags. `limit` defaults to 100 and never exceeds 500; a
/// negative value counts as its absolute value.
pub async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<TagsQuery>,
) -> ApiResult<Json<TagsResponse>> {
    let rows = Term::list_tags(state.db(), clamp_limit(query.limit)).await?;

    let tags: Vec<TagEntry> = rows
        .into_iter()
        .map(|row| TagEntry {
            link: format!("{}/tag/{}", state.site_url(), row.slug),
            id: row.id,
            name: row.name,
            slug: row.slug,
            count: row.count,
        })
        .collect();

    Ok(Json(TagsResponse {
        success: true,
        total: tags.len(),
        tags,
    }))
}

fn clamp_limit(requested: Option<i64>) -> i64 {
    requested
        .map(i64::saturating_abs)
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_TAG_LIMIT)
        .min(MAX_TAG_LIMIT)
}
