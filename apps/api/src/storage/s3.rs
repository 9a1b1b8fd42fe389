use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{error, info};
use uuid::Uuid;

use super::{ImageStore, StorageError, StoredImage};

const IMAGE_FOLDER: &str = "resumex/images";

/// S3 / MinIO backed image store. Objects are publicly readable under
/// `public_url`; the object key doubles as the public id.
#[derive(Clone)]
pub struct S3ImageStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_url: String,
}

impl S3ImageStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: &str, public_url: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

pub fn new_public_id(owner: Uuid) -> String {
    format!("{IMAGE_FOLDER}/{owner}/{}", Uuid::new_v4())
}

/// Uploader of an image, or `None` when `public_id` is not one of ours.
pub fn owner_of(public_id: &str) -> Option<Uuid> {
    let rest = public_id.strip_prefix(IMAGE_FOLDER)?.strip_prefix('/')?;
    let (owner, image) = rest.split_once('/')?;
    Uuid::parse_str(image).ok()?;
    Uuid::parse_str(owner).ok()
}

pub fn public_url_for(base: &str, public_id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), public_id)
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn upload(
        &self,
        owner: Uuid,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredImage, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::EmptyUpload);
        }

        let public_id = new_public_id(owner);
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&public_id)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .metadata("uploaded-by", owner.to_string())
            .send()
            .await
            .map_err(|e| {
                error!(
                    "Upload to s3://{}/{} failed: {}",
                    self.bucket,
                    public_id,
                    DisplayErrorContext(&e)
                );
                StorageError::Upload(Box::new(e.into_service_error()))
            })?;

        info!("Uploaded {size} byte image to s3://{}/{}", self.bucket, public_id);
        Ok(StoredImage {
            url: public_url_for(&self.public_url, &public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), StorageError> {
        if owner_of(public_id).is_none() {
            return Err(StorageError::InvalidPublicId(public_id.to_string()));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(public_id)
            .send()
            .await
            .map_err(|e| {
                error!(
                    "Delete of s3://{}/{} failed: {}",
                    self.bucket,
                    public_id,
                    DisplayErrorContext(&e)
                );
                StorageError::Delete {
                    public_id: public_id.to_string(),
                    source: Box::new(e.into_service_error()),
                }
            })?;

        info!("Deleted image s3://{}/{}", self.bucket, public_id);
        Ok(())
    }
}
