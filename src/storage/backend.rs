//! Storage backend capability interface

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::streams::ByteStream;

/// Capability interface implemented by each storage backend
///
/// `path` is the sharded object path derived from the key; `key` is threaded
/// through for error messages only.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write a blob at the given path, creating parents as needed
    async fn put(&self, path: &str, bytes: Vec<u8>) -> StorageResult<()>;

    /// Read a whole blob
    async fn get(&self, path: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Open a blob as a chunk stream
    async fn stream(&self, path: &str, key: &str) -> StorageResult<ByteStream>;

    /// Remove a blob; absence is reported, never silently ignored
    async fn delete(&self, path: &str, key: &str) -> StorageResult<()>;
}
