use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resumex_api::cache::{CacheClient, RedisSessionStore};
use resumex_api::config::Config;
use resumex_api::db::{create_pool, ensure_schema};
use resumex_api::queue::RedisQueue;
use resumex_api::routes::{build_router, cors_layer};
use resumex_api::scrape::{ScrapeProducer, QUEUE_NAME};
use resumex_api::state::AppState;
use resumex_api::storage::S3ImageStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeX API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // One Redis connection for the whole process, shared by sessions and the queue
    let cache = CacheClient::connect(&config.redis_url).await?;
    let sessions = Arc::new(RedisSessionStore::new(cache.handle()));
    let queue = Arc::new(RedisQueue::new(
        cache.handle(),
        &config.queue_prefix,
        QUEUE_NAME,
    ));
    info!("Scrape queue ready ({}:{QUEUE_NAME})", config.queue_prefix);

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let images = Arc::new(S3ImageStore::new(
        s3,
        &config.s3_bucket,
        &config.s3_public_url,
    ));
    info!("Image store initialized (bucket: {})", config.s3_bucket);

    let state = AppState {
        db: db.clone(),
        sessions,
        images,
        scrape: ScrapeProducer::new(queue),
        config: config.clone(),
    };

    if config.cors_allowed_origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing any origin");
    }
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router and its state are gone; release the shared resources.
    cache.disconnect();
    db.close().await;
    info!("Shutdown complete");

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resumex-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
