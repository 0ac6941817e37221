//! HTTP route handlers.

pub mod admin;
pub mod auth;
pub mod authors;
pub mod files;
pub mod ping;
pub mod publish;
pub mod terms;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

use crate::middleware::{require_api_key, require_api_key_legacy};
use crate::state::AppState;

/// Assemble every gateway route.
///
/// The current namespace exposes the full publishing surface; the legacy
/// namespace carries only the endpoints old clients ever called, wired to
/// the same handlers. Ping stays outside the key check in both.
pub fn router(state: &AppState) -> Router<AppState> {
    let current = Router::new()
        .route("/publish", post(publish::publish))
        .route("/categories", get(terms::list_categories))
        .route("/tags", get(terms::list_tags))
        .route("/authors", get(authors::list_authors))
        .route_layer(from_fn_with_state(state.clone(), require_api_key))
        .route("/ping", get(ping::ping));

    let legacy = Router::new()
        .route("/publish", post(publish::publish))
        .route("/categories", get(terms::list_categories))
        .route_layer(from_fn_with_state(state.clone(), require_api_key_legacy))
        .route("/ping", get(ping::ping));

    Router::new()
        .nest("/scrivano/v1", current)
        .nest("/writer/v1", legacy)
        .merge(auth::router())
        .merge(admin::router())
        .merge(files::router())
}
