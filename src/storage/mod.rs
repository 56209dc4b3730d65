//! Backend-polymorphic blob storage
//!
//! The [`StorageService`] facade stores, retrieves, streams, deletes and
//! serves opaque byte blobs through whichever backend the configuration
//! selected at construction. It keeps no catalog: every store hands back a
//! [`FileMetadata`] record and persisting it is the caller's job.

mod backend;
mod fs;
pub mod key;
mod s3;

pub use backend::StorageBackend;
pub use fs::FsBackend;
pub use s3::BucketBackend;

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{self, Codec, Level};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::hash::hash_bytes;
use crate::serve::{
    self, static_file::serve_static, stream::serve_stream, ServeContext, ServeMetadata,
    ServeOptions, ServeOverrides,
};
use crate::streams::ByteStream;

/// Metadata recorded for every stored file
///
/// `hash` and `filesize` always describe the original, uncompressed bytes;
/// `encoding` says how the bytes sit on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Storage key for the file
    pub key: String,
    /// Original filename
    pub filename: String,
    /// File size in bytes
    pub filesize: u64,
    /// MIME type
    pub mime_type: String,
    /// SHA-256 hash of the file content
    pub hash: String,
    /// Upload timestamp
    pub last_modified: DateTime<Utc>,
    /// Compression applied at rest, if any
    pub encoding: Option<Codec>,
}

/// Caller-supplied naming for [`StorageService::store_with_metadata`]
#[derive(Debug, Clone, Default)]
pub struct StoreMeta {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

/// An uploaded file ready to store
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

enum BackendKind {
    Filesystem(FsBackend),
    Bucket(BucketBackend),
}

/// Storage service handling both filesystem and bucket backends
pub struct StorageService {
    backend: BackendKind,
    cache_control: Option<String>,
}

impl StorageService {
    /// Build the service for the configured backend
    ///
    /// The backend choice is resolved exactly once here; every operation
    /// afterwards dispatches on this fixed kind.
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let cache_control = config.cache_control().map(String::from);
        let backend = match config {
            StorageConfig::Filesystem(cfg) => {
                BackendKind::Filesystem(FsBackend::new(&cfg.base_path)?)
            }
            StorageConfig::Bucket(cfg) => BackendKind::Bucket(BucketBackend::new(&cfg).await?),
        };
        Ok(Self {
            backend,
            cache_control,
        })
    }

    /// The active backend kind, for logs and diagnostics
    pub fn kind(&self) -> &'static str {
        match self.backend {
            BackendKind::Filesystem(_) => "filesystem",
            BackendKind::Bucket(_) => "bucket",
        }
    }

    /// Default Cache-Control header served with stored objects
    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    fn backend(&self) -> &dyn StorageBackend {
        match &self.backend {
            BackendKind::Filesystem(backend) => backend,
            BackendKind::Bucket(backend) => backend,
        }
    }

    /// Store bytes and return the generated storage key
    pub async fn store(&self, bytes: &[u8], compress: Option<Codec>) -> StorageResult<String> {
        if bytes.is_empty() {
            return Err(StorageError::Failed("Cannot store empty data".to_string()));
        }

        let key = key::generate_key();
        let path = key::key_to_path(&key);

        let payload = match compress {
            Some(codec) => codec::compress_async(codec, Level::Default, bytes.to_vec())
                .await
                .map_err(|e| StorageError::Failed(format!("Compression failed: {}", e)))?,
            None => bytes.to_vec(),
        };

        let stored_len = payload.len();
        self.backend().put(&path, payload).await?;
        tracing::info!("Storage: stored {} bytes -> {}", stored_len, key);
        Ok(key)
    }

    /// Store bytes and assemble the full metadata record
    pub async fn store_with_metadata(
        &self,
        bytes: &[u8],
        meta: StoreMeta,
        compress: Option<Codec>,
    ) -> StorageResult<FileMetadata> {
        let key = self.store(bytes, compress).await?;

        let metadata = FileMetadata {
            key,
            filename: meta.filename.unwrap_or_else(|| "attachment".to_string()),
            filesize: bytes.len() as u64,
            mime_type: meta
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            hash: hash_bytes(bytes),
            last_modified: Utc::now(),
            encoding: compress,
        };

        tracing::info!(
            "Storage: stored file \"{}\" ({} bytes) -> {}",
            metadata.filename,
            metadata.filesize,
            metadata.key
        );
        Ok(metadata)
    }

    /// Store an uploaded file, guessing the MIME type when the upload
    /// carried none
    pub async fn store_file(
        &self,
        file: UploadFile,
        compress: Option<Codec>,
    ) -> StorageResult<FileMetadata> {
        if file.bytes.is_empty() {
            return Err(StorageError::Failed(
                "No data provided to store".to_string(),
            ));
        }

        let mime_type = file.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&file.filename)
                .first_or_octet_stream()
                .to_string()
        });

        self.store_with_metadata(
            &file.bytes,
            StoreMeta {
                filename: Some(file.filename),
                mime_type: Some(mime_type),
            },
            compress,
        )
        .await
    }

    /// Retrieve stored bytes, optionally decompressing
    pub async fn retrieve(&self, key: &str, decompress: Option<Codec>) -> StorageResult<Vec<u8>> {
        if !key::valid_key(key) {
            return Err(StorageError::not_found(key));
        }
        let path = key::key_to_path(key);
        let bytes = self.backend().get(&path, key).await?;

        let bytes = match decompress {
            Some(codec) => codec::decompress_async(codec, bytes)
                .await
                .map_err(|e| StorageError::Failed(format!("Decompression failed: {}", e)))?,
            None => bytes,
        };

        tracing::debug!("Storage: retrieved {} bytes <- {}", bytes.len(), key);
        Ok(bytes)
    }

    /// Open stored bytes as a chunk stream, optionally decompressing
    pub async fn stream(&self, key: &str, decompress: Option<Codec>) -> StorageResult<ByteStream> {
        if !key::valid_key(key) {
            return Err(StorageError::not_found(key));
        }
        let path = key::key_to_path(key);
        let stream = self.backend().stream(&path, key).await?;

        Ok(match decompress {
            Some(codec) => codec::decode_stream(codec, stream),
            None => stream,
        })
    }

    /// Delete a stored object
    ///
    /// Deleting an absent key reports `NotFound`, no matter how many times
    /// it is retried.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        if !key::valid_key(key) {
            return Err(StorageError::not_found(key));
        }
        let path = key::key_to_path(key);
        self.backend().delete(&path, key).await?;
        tracing::info!("Storage: deleted {}", key);
        Ok(())
    }

    /// Serve a stored object as an HTTP response
    ///
    /// Dispatches to the whole-file adapter for the filesystem backend and
    /// the stream adapter for the bucket backend. `NotFound` becomes a 404,
    /// anything else a generic 500.
    pub async fn serve(
        &self,
        ctx: ServeContext,
        key: &str,
        metadata: ServeMetadata,
        overrides: ServeOverrides,
    ) -> Response {
        let options: ServeOptions = overrides.resolve(
            &ctx.query,
            metadata.filename.as_deref(),
            key,
            self.cache_control.as_deref(),
        );

        if !key::valid_key(key) {
            return serve::not_found();
        }
        let path = key::key_to_path(key);

        match &self.backend {
            BackendKind::Filesystem(backend) => {
                let full_path = backend.full_path(&path);
                serve_static(&ctx, &full_path, &metadata, &options).await
            }
            BackendKind::Bucket(backend) => match backend.stream(&path, key).await {
                Ok(stream) => serve_stream(&ctx, stream, &metadata, &options),
                Err(StorageError::NotFound(_)) => {
                    tracing::info!("Storage: HTTP 404 - {} not found", key);
                    serve::not_found()
                }
                Err(StorageError::Failed(message)) => {
                    tracing::error!("Storage: HTTP 500 - failed to serve {}: {}", key, message);
                    serve::internal_error()
                }
            },
        }
    }

    /// Serve using a full metadata record, as persisted by the caller
    pub async fn serve_with_metadata(
        &self,
        ctx: ServeContext,
        metadata: &FileMetadata,
    ) -> Response {
        let key = metadata.key.clone();
        self.serve(
            ctx,
            &key,
            ServeMetadata::from(metadata),
            ServeOverrides::default(),
        )
        .await
    }
}
