pub mod health;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::details::handlers::{handle_get, handle_patch};
use crate::details::{DeclarationDetail, PersonalDetail, ProfileSummary};
use crate::metadata::handlers as metadata;
use crate::scrape::handlers as scrape;
use crate::state::AppState;
use crate::storage::handlers as images;

/// Images above this size are rejected before reaching the store.
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Detail records
        .route(
            "/api/v1/declaration-detail",
            get(handle_get::<DeclarationDetail>).patch(handle_patch::<DeclarationDetail>),
        )
        .route(
            "/api/v1/personal-detail",
            get(handle_get::<PersonalDetail>).patch(handle_patch::<PersonalDetail>),
        )
        .route(
            "/api/v1/profile-summary",
            get(handle_get::<ProfileSummary>).patch(handle_patch::<ProfileSummary>),
        )
        // Styling metadata
        .route(
            "/api/v1/resume-metadata",
            get(metadata::handle_get_metadata).patch(metadata::handle_patch_metadata),
        )
        // Job-description scraping
        .route("/api/v1/jd-scrapper", post(scrape::handle_submit))
        .route("/api/v1/jd-scrapper/jobs/:id", get(scrape::handle_get_job))
        .route("/api/v1/jd-scrapper/failed", get(scrape::handle_list_failed))
        .route(
            "/api/v1/jd-scrapper/failed/:id",
            delete(scrape::handle_remove_failed),
        )
        // Images
        .route(
            "/api/v1/images",
            post(images::handle_upload).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/api/v1/images/*public_id", delete(images::handle_delete))
        .with_state(state)
}

/// CORS for the editor front end. With no configured origins every origin
/// is allowed, which suits local development.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}
