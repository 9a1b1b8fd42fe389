//! Generic GET / PATCH handlers shared by every detail resource.

use async_trait::async_trait;
use axum::{extract::State, Json};
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::details::{apply_patch, DetailResource};
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::Envelope;
use crate::state::AppState;

/// Postgres persistence for a detail resource, one row per user.
///
/// `lock` and `save` run inside the caller's transaction.
#[async_trait]
pub trait DetailStore: DetailResource + Sized {
    async fn fetch(db: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error>;

    /// Inserts the default row if the user has none, then reads it
    /// `FOR UPDATE` so concurrent patches queue up behind this one.
    async fn lock(conn: &mut PgConnection, user_id: Uuid) -> Result<Self, sqlx::Error>;

    async fn save(&self, conn: &mut PgConnection, user_id: Uuid) -> Result<Self, sqlx::Error>;
}

/// Merges `patch` into the user's stored record under a row lock, so two
/// patches touching different fields both survive. Nothing is written when
/// the merged record is invalid.
pub async fn patch_detail<R: DetailStore>(
    db: &PgPool,
    user_id: Uuid,
    patch: &Map<String, Value>,
) -> Result<R, AppError> {
    let mut tx = db.begin().await?;
    let current = R::lock(&mut *tx, user_id).await?;
    let merged = merge_and_validate(&current, patch)?;
    let saved = merged.save(&mut *tx, user_id).await?;
    tx.commit().await?;
    Ok(saved)
}

/// GET /api/v1/{resource}
///
/// Users who never saved the resource get an empty record rather than 404,
/// so editors can always render.
pub async fn handle_get<R: DetailStore>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<R>>, AppError> {
    let envelope = match R::fetch(&state.db, user_id).await? {
        Some(record) => Envelope::ok(format!("{} fetched", R::LABEL), record),
        None => Envelope::ok(format!("{} not saved yet", R::LABEL), R::default()),
    };
    Ok(Json(envelope))
}

/// PATCH /api/v1/{resource}
///
/// Body holds only the changed fields.
pub async fn handle_patch<R: DetailStore>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(patch): AppJson<Map<String, Value>>,
) -> Result<Json<Envelope<R>>, AppError> {
    if patch.is_empty() {
        return Err(AppError::Validation("No fields to update".to_string()));
    }

    let saved = patch_detail::<R>(&state.db, user_id, &patch).await?;

    info!(
        "Updated {} for user {user_id} ({} field(s))",
        R::PATH,
        patch.len()
    );
    Ok(Json(Envelope::ok(format!("{} updated", R::LABEL), saved)))
}

fn merge_and_validate<R: DetailResource>(
    current: &R,
    patch: &Map<String, Value>,
) -> Result<R, AppError> {
    let merged = apply_patch(current, patch).map_err(|e| AppError::Validation(e.to_string()))?;
    if let Some(field) = merged.missing_required() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(merged)
}
