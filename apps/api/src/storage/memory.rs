//! In-process image store for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::s3::{new_public_id, owner_of, public_url_for};
use super::{ImageStore, StorageError, StoredImage};

#[derive(Default)]
pub struct MemoryImageStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryImageStore {
    pub async fn contains(&self, public_id: &str) -> bool {
        self.objects.lock().await.contains_key(public_id)
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(
        &self,
        owner: Uuid,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<StoredImage, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::EmptyUpload);
        }
        let public_id = new_public_id(owner);
        self.objects.lock().await.insert(public_id.clone(), bytes);
        Ok(StoredImage {
            url: public_url_for("http://images.test", &public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), StorageError> {
        if owner_of(public_id).is_none() {
            return Err(StorageError::InvalidPublicId(public_id.to_string()));
        }
        // Deleting a missing object succeeds, as it does on S3.
        self.objects.lock().await.remove(public_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_delete() {
        let store = MemoryImageStore::default();
        let image = store
            .upload(Uuid::new_v4(), Bytes::from_static(b"\x89PNG\r\n"), "image/png")
            .await
            .unwrap();
        assert!(!image.url.is_empty());
        assert!(image.url.ends_with(&image.public_id));
        assert!(store.contains(&image.public_id).await);

        store.delete(&image.public_id).await.unwrap();
        assert!(!store.contains(&image.public_id).await);
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let store = MemoryImageStore::default();
        let err = store.upload(Uuid::new_v4(), Bytes::new(), "image/png").await.unwrap_err();
        assert!(matches!(err, StorageError::EmptyUpload));
    }

    #[tokio::test]
    async fn test_delete_outside_image_folder_refused() {
        let store = MemoryImageStore::default();
        let err = store.delete("backups/x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPublicId(id) if id == "backups/x"));
    }
}
