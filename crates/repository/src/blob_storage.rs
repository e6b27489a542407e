//! In-memory `BlobStorage`. Paths are opaque keys; no directory semantics
//! beyond prefix matching for `list`.

use async_trait::async_trait;
use dashmap::DashMap;
use narrata_core::traits::storage::BlobStorage;
use narrata_core::{Error, Result};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryBlobStorage {
    blobs: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(path)
            .map(|b| b.clone())
            .ok_or_else(|| Error::Storage(format!("no blob at {path}")))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.blobs.remove(path);
        Ok(())
    }
}
