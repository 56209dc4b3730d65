//! Local filesystem storage backend

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use crate::error::{StorageError, StorageResult};
use crate::streams::ByteStream;

use super::backend::StorageBackend;

/// Filesystem-backed blob storage rooted at a base directory
pub struct FsBackend {
    base_path: PathBuf,
}

impl FsBackend {
    /// Create the backend, ensuring the base directory exists
    pub fn new(base_path: impl AsRef<Path>) -> StorageResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::Failed(format!(
                "Could not create base directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        tracing::info!("Storage: filesystem mode - path: {}", base_path.display());
        Ok(Self { base_path })
    }

    /// Absolute location of a sharded object path
    pub fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

fn map_io_error(e: io::Error, key: &str) -> StorageError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::not_found(key)
    } else {
        StorageError::Failed(e.to_string())
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Failed(e.to_string()))?;
        }
        tokio::fs::write(&full, &bytes)
            .await
            .map_err(|e| StorageError::Failed(e.to_string()))
    }

    async fn get(&self, path: &str, key: &str) -> StorageResult<Vec<u8>> {
        tokio::fs::read(self.full_path(path))
            .await
            .map_err(|e| map_io_error(e, key))
    }

    async fn stream(&self, path: &str, key: &str) -> StorageResult<ByteStream> {
        let file = tokio::fs::File::open(self.full_path(path))
            .await
            .map_err(|e| map_io_error(e, key))?;
        Ok(ReaderStream::new(file).boxed())
    }

    async fn delete(&self, path: &str, key: &str) -> StorageResult<()> {
        tokio::fs::remove_file(self.full_path(path))
            .await
            .map_err(|e| map_io_error(e, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::stream_to_bytes;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_creates_shard_directories() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();

        backend
            .put("ab/cd/ef/abcdef-key", b"payload".to_vec())
            .await
            .unwrap();

        assert!(dir.path().join("ab/cd/ef/abcdef-key").is_file());
        let read = backend.get("ab/cd/ef/abcdef-key", "abcdef-key").await.unwrap();
        assert_eq!(read, b"payload");
    }

    #[tokio::test]
    async fn test_stream_matches_get() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();

        let data: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();
        backend.put("aa/bb/cc/key", data.clone()).await.unwrap();

        let streamed = stream_to_bytes(backend.stream("aa/bb/cc/key", "key").await.unwrap())
            .await
            .unwrap();
        assert_eq!(streamed, data);
    }

    #[tokio::test]
    async fn test_missing_file_maps_to_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();

        let err = backend.get("aa/bb/cc/nope", "nope").await.unwrap_err();
        assert_eq!(err, StorageError::NotFound("File not found: nope".into()));

        let err = backend.delete("aa/bb/cc/nope", "nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
