use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::SessionStore;
use crate::config::Config;
use crate::scrape::ScrapeProducer;
use crate::storage::ImageStore;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every external resource is constructed in `main` and passed in here;
/// nothing reaches for a global.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Resolves bearer tokens; backed by the process-wide Redis connection.
    pub sessions: Arc<dyn SessionStore>,
    pub images: Arc<dyn ImageStore>,
    pub scrape: ScrapeProducer,
    pub config: Config,
}
