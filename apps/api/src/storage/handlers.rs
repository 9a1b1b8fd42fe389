//! Axum route handlers for image upload and deletion.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::Envelope;
use crate::state::AppState;
use crate::storage::{owner_of, StoredImage};

const FILE_FIELD: &str = "file";

/// POST /api/v1/images
///
/// Multipart body; the image goes in the `file` field.
pub async fn handle_upload(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Envelope<StoredImage>>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;

        let image = state.images.upload(user_id, bytes, &content_type).await?;
        info!("User {user_id} uploaded image {}", image.public_id);
        return Ok(Json(Envelope::ok("Image uploaded", image)));
    }

    Err(AppError::Validation(format!(
        "Multipart field '{FILE_FIELD}' is required"
    )))
}

/// DELETE /api/v1/images/*public_id
///
/// Only the uploader may delete an image; anyone else gets 404.
pub async fn handle_delete(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(public_id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    match owner_of(&public_id) {
        Some(owner) if owner == user_id => {}
        Some(_) => {
            warn!("User {user_id} tried to delete image {public_id} they do not own");
            return Err(AppError::NotFound(format!("Image {public_id} not found")));
        }
        None => {
            return Err(AppError::Validation(format!(
                "'{public_id}' is not an image public id"
            )))
        }
    }

    state.images.delete(&public_id).await?;
    info!("User {user_id} deleted image {public_id}");
    Ok(Json(Envelope::ok("Image deleted", ())))
}
