use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::{BlobId, BlobStore, StorageError, StorageResult};
use crate::config::settings::StorageSettings;

/// Client for the configured S3 (MinIO) endpoint, shared by every bucket.
pub fn client(settings: &StorageSettings) -> Client {
    let credentials = Credentials::new(
        &settings.access_key,
        &settings.secret_key,
        None,
        None,
        "static",
    );

    let config = Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .endpoint_url(&settings.endpoint)
        .credentials_provider(credentials)
        .force_path_style(true) // Required for MinIO
        .build();

    Client::from_conf(config)
}

/// One S3 (MinIO) bucket acting as a blob namespace.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket if it does not exist yet.
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!(bucket = %self.bucket, "Created bucket");
                Ok(())
            }
            Err(e)
                if e.as_service_error().is_some_and(|se| {
                    se.is_bucket_already_owned_by_you() || se.is_bucket_already_exists()
                }) =>
            {
                Ok(())
            }
            Err(e) => Err(StorageError::unavailable(format!(
                "Failed to create bucket {}: {}",
                self.bucket,
                DisplayErrorContext(&e)
            ))),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, data: Bytes) -> StorageResult<BlobId> {
        let id = BlobId::generate();
        debug!(bucket = %self.bucket, %id, "Uploading {} bytes", data.len());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(id.as_str())
            .body(ByteStream::from(data))
            .content_type(mime::APPLICATION_OCTET_STREAM.as_ref())
            .send()
            .await
            .map_err(|e| {
                StorageError::unavailable(format!("Failed to upload {}: {}", id, DisplayErrorContext(&e)))
            })?;

        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> StorageResult<Bytes> {
        debug!(bucket = %self.bucket, %id, "Downloading blob");

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(id.as_str())
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_key() => StorageError::NotFound(id.clone()),
                _ => StorageError::unavailable(format!(
                    "Failed to download {}: {}",
                    id,
                    DisplayErrorContext(&e)
                )),
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::unavailable(format!("Failed to read body of {}: {}", id, e)))?;

        Ok(body.into_bytes())
    }

    async fn delete(&self, id: &BlobId) -> StorageResult<()> {
        // S3 answers 204 for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id.as_str())
            .send()
            .await
            .map_err(|e| {
                StorageError::unavailable(format!("Failed to delete {}: {}", id, DisplayErrorContext(&e)))
            })?;

        Ok(())
    }
}
