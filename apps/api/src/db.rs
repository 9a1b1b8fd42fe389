use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Idempotent DDL for the per-user tables.
const SCHEMA: &str = include_str!("../schema.sql");

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates any missing tables. Every statement is `IF NOT EXISTS`, so this
/// is safe on every boot.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    let statements = schema_statements(SCHEMA);
    for statement in &statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Schema statement failed: {statement}"))?;
    }
    info!("Database schema verified ({} statements)", statements.len());
    Ok(())
}

fn schema_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.lines().all(|l| l.trim_start().starts_with("--")))
        .collect()
}

/// Pool for tests that need a real database, or `None` (skip) when
/// `DATABASE_URL` is not set. The schema is created once per test binary.
#[cfg(test)]
pub async fn test_pool() -> Option<PgPool> {
    static SCHEMA_READY: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = create_pool(&url).await.expect("postgres reachable");
    SCHEMA_READY
        .get_or_init(|| async {
            ensure_schema(&pool).await.expect("schema applies");
        })
        .await;
    Some(pool)
}
