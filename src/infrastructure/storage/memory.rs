use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{BlobId, BlobStore, StorageError, StorageResult};

/// Process-local blob store with switchable failures.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    blobs: RwLock<HashMap<BlobId, Bytes>>,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob under a caller-chosen id.
    pub async fn insert(&self, id: impl Into<BlobId>, data: impl Into<Bytes>) {
        self.inner.blobs.write().await.insert(id.into(), data.into());
    }

    pub async fn contains(&self, id: &BlobId) -> bool {
        self.inner.blobs.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn ids(&self) -> Vec<BlobId> {
        self.inner.blobs.read().await.keys().cloned().collect()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.inner.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.inner.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.inner.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Bytes) -> StorageResult<BlobId> {
        if self.inner.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("put refused"));
        }
        let id = BlobId::generate();
        self.inner.blobs.write().await.insert(id.clone(), data);
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> StorageResult<Bytes> {
        if self.inner.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("get refused"));
        }
        self.inner
            .blobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.clone()))
    }

    async fn delete(&self, id: &BlobId) -> StorageResult<()> {
        if self.inner.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("delete refused"));
        }
        self.inner.blobs.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryBlobStore::new();
        let id = store.put(Bytes::from_static(b"abc")).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap(), Bytes::from_static(b"abc"));

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_of_missing_id_is_ok() {
        let store = MemoryBlobStore::new();
        store.delete(&BlobId::from("nope")).await.unwrap();
    }

    #[tokio::test]
    async fn injected_failures_are_not_not_found() {
        let store = MemoryBlobStore::new();
        store.insert("v1", &b"video"[..]).await;
        store.fail_gets(true);

        let err = store.get(&BlobId::from("v1")).await.unwrap_err();
        assert!(!err.is_not_found());

        store.fail_puts(true);
        assert!(store.put(Bytes::new()).await.is_err());
        assert_eq!(store.len().await, 1);
    }
}
