//! Axum route handlers for resume styling metadata.

use axum::{extract::State, Json};
use sqlx::types::Json as DbJson;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::metadata::{apply, ResumeMetadata, SectionPatch};
use crate::models::Envelope;
use crate::state::AppState;

async fn fetch_metadata(db: &PgPool, user_id: Uuid) -> Result<ResumeMetadata, sqlx::Error> {
    let stored: Option<DbJson<ResumeMetadata>> =
        sqlx::query_scalar("SELECT document FROM resume_metadata WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await?;
    Ok(stored.map(|DbJson(doc)| doc).unwrap_or_default())
}

/// Inserts an empty document if the user has none, then reads it
/// `FOR UPDATE` inside the caller's transaction.
async fn lock_metadata(conn: &mut PgConnection, user_id: Uuid) -> Result<ResumeMetadata, sqlx::Error> {
    sqlx::query("INSERT INTO resume_metadata (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let DbJson(document) = sqlx::query_scalar::<_, DbJson<ResumeMetadata>>(
        "SELECT document FROM resume_metadata WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(document)
}

/// Applies one section patch to the stored document under a row lock, so
/// editors saving different sections at the same time never overwrite
/// each other.
pub async fn patch_metadata(
    db: &PgPool,
    user_id: Uuid,
    patch: SectionPatch,
) -> Result<ResumeMetadata, sqlx::Error> {
    let mut tx = db.begin().await?;
    let document = apply(lock_metadata(&mut *tx, user_id).await?, patch);

    sqlx::query("UPDATE resume_metadata SET document = $2, updated_at = NOW() WHERE user_id = $1")
        .bind(user_id)
        .bind(DbJson(&document))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(document)
}

/// GET /api/v1/resume-metadata
pub async fn handle_get_metadata(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<ResumeMetadata>>, AppError> {
    let document = fetch_metadata(&state.db, user_id).await?;
    Ok(Json(Envelope::ok("Resume metadata fetched", document)))
}

/// PATCH /api/v1/resume-metadata
///
/// Body is a single `SectionPatch`; returns the whole updated document.
pub async fn handle_patch_metadata(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(patch): AppJson<SectionPatch>,
) -> Result<Json<Envelope<ResumeMetadata>>, AppError> {
    let section = patch.section();
    let document = patch_metadata(&state.db, user_id, patch).await?;

    info!("Updated resume metadata section {section} for user {user_id}");
    Ok(Json(Envelope::ok("Resume metadata updated", document)))
}
