//! Image Store Adapter: single-shot uploads and deletes against object storage.
//!
//! No retries and no local caching. Transport errors are wrapped once and
//! carried as the error source so callers see the original failure.

pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use s3::{owner_of, S3ImageStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Refusing to upload an empty image")]
    EmptyUpload,

    #[error("'{0}' is not an image public id")]
    InvalidPublicId(String),

    #[error("Image upload failed: {0}")]
    Upload(#[source] BoxError),

    #[error("Image delete failed for '{public_id}': {source}")]
    Delete {
        public_id: String,
        #[source]
        source: BoxError,
    },
}

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub url: String,
    pub public_id: String,
}

/// Public ids are `resumex/images/<owner>/<uuid>`, so the uploader can be
/// read back from the id itself. Implementations refuse to delete anything
/// outside that layout.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(
        &self,
        owner: Uuid,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredImage, StorageError>;

    async fn delete(&self, public_id: &str) -> Result<(), StorageError>;
}
