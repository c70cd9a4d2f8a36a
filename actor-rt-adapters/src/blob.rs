//! Content-addressed byte blobs, used for WASM module payloads (spec.md
//! §4.2 "Blob adapter").

use async_trait::async_trait;
use dashmap::DashMap;

use actor_rt_core::AdapterResult;

/// Storage of arbitrary byte payloads by path.
#[async_trait]
pub trait BlobAdapter: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> AdapterResult<()>;

    async fn get(&self, path: &str) -> AdapterResult<Option<Vec<u8>>>;

    async fn exists(&self, path: &str) -> AdapterResult<bool>;

    async fn delete(&self, path: &str) -> AdapterResult<()>;
}

/// Single-process, in-memory `BlobAdapter` (spec.md §6 "Adapter selection":
/// `inmemory` tag).
#[derive(Debug, Default)]
pub struct InMemoryBlobAdapter {
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryBlobAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobAdapter for InMemoryBlobAdapter {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> AdapterResult<()> {
        self.blobs.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> AdapterResult<Option<Vec<u8>>> {
        Ok(self.blobs.get(path).map(|entry| entry.clone()))
    }

    async fn exists(&self, path: &str) -> AdapterResult<bool> {
        Ok(self.blobs.contains_key(path))
    }

    async fn delete(&self, path: &str) -> AdapterResult<()> {
        self.blobs.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let blobs = InMemoryBlobAdapter::new();
        blobs.put("wasm/echo-1.0.0", vec![1, 2, 3]).await.unwrap();
        let loaded = blobs.get("wasm/echo-1.0.0").await.unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn exists_reflects_presence() {
        let blobs = InMemoryBlobAdapter::new();
        assert!(!blobs.exists("wasm/echo-1.0.0").await.unwrap());
        blobs.put("wasm/echo-1.0.0", vec![]).await.unwrap();
        assert!(blobs.exists("wasm/echo-1.0.0").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_blob() {
        let blobs = InMemoryBlobAdapter::new();
        blobs.put("wasm/echo-1.0.0", vec![9]).await.unwrap();
        blobs.delete("wasm/echo-1.0.0").await.unwrap();
        assert!(blobs.get("wasm/echo-1.0.0").await.unwrap().is_none());
    }
}
