//! Binary object storage.
//!
//! A [`BlobStore`] is a single namespace of immutable, id-addressed blobs.
//! The pipeline uses two of them: uploaded videos and extracted audio.

pub mod memory;
pub mod s3;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

/// Store-assigned identifier of a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    /// Fresh identifier for a blob about to be stored.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(BlobId),

    #[error("Blob store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` and return the id assigned to it.
    async fn put(&self, data: Bytes) -> StorageResult<BlobId>;

    /// Fetch a blob. Missing ids yield [`StorageError::NotFound`].
    async fn get(&self, id: &BlobId) -> StorageResult<Bytes>;

    /// Remove a blob. Deleting an id that does not exist succeeds.
    async fn delete(&self, id: &BlobId) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = BlobId::generate();
        let b = BlobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn blob_id_serializes_as_plain_string() {
        let id = BlobId::from("v1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"v1\"");
    }
}
