//! Service health descriptor.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

use crate::db;
use crate::error::ApiResult;
use crate::models::Setting;
use crate::state::AppState;

/// Health descriptor returned by GET /ping.
#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub postgres: String,
    pub site: SiteInfo,
    pub endpoints: Endpoints,
    pub timestamp: String,
}

/// Site identity block.
#[derive(Debug, Serialize)]
pub struct SiteInfo {
    pub name: String,
    pub url: String,
}

/// Absolute URLs of the authenticated endpoints.
#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub publish: String,
    pub categories: String,
    pub tags: String,
    pub authors: String,
}

/// GET /ping
///
/// Unauthenticated reachability check: service identity, storage server
/// version, site identity, and where the real endpoints live. Legacy
/// clients calling the old namespace get the same body, pointing at the
/// current one.
pub async fn ping(State(state): State<AppState>) -> ApiResult<Json<PingResponse>> {
    let site_url = state.site_url();
    let postgres = db::server_version(state.db()).await?;
    let name = Setting::site_name(state.db()).await?;

    Ok(Json(PingResponse {
        status: "ok",
        service: "scrivano",
        version: env!("CARGO_PKG_VERSION"),
        postgres,
        site: SiteInfo {
            name,
            url: site_url.to_string(),
        },
        endpoints: Endpoints {
            publish: format!("{site_url}/scrivano/v1/publish"),
            categories: format!("{site_url}/scrivano/v1/categories"),
            tags: format!("{site_url}/scrivano/v1/tags"),
            authors: format!("{site_url}/scrivano/v1/authors"),
        },
        timestamp: Utc::now().to_rfc3339(),
    }))
}
