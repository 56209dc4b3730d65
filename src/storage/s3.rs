//! S3-compatible storage backend
//!
//! Wraps the AWS SDK for S3-compatible object storage (MinIO, Cloudflare
//! R2, Backblaze B2, AWS S3).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use futures::StreamExt;

use crate::config::BucketConfig;
use crate::error::{StorageError, StorageResult};
use crate::streams::ByteStream;

use super::backend::StorageBackend;

/// Bucket-backed blob storage
pub struct BucketBackend {
    client: Client,
    bucket: String,
    cache_control: Option<String>,
}

impl BucketBackend {
    /// Create a new backend from bucket configuration
    ///
    /// The SDK client is built exactly once; credentials and endpoint are
    /// never re-read per call.
    pub async fn new(config: &BucketConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "bodega",
        );

        let region = config.region.clone().unwrap_or_else(|| "auto".to_string());

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style)
            .build();

        let client = Client::from_conf(s3_config);

        // Test the connection by checking the bucket exists
        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    e
                );
            }
        }

        Ok(Self {
            client,
            bucket,
            cache_control: config.cache_control.clone(),
        })
    }

    /// Check whether an object exists (HEAD request)
    async fn exists(&self, path: &str, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service = e.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Failed(format!(
                        "Failed to check object {}: {}",
                        key, service
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl StorageBackend for BucketBackend {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes))
            .set_cache_control(self.cache_control.clone())
            .send()
            .await
            .map_err(|e| StorageError::Failed(format!("Failed to put object: {}", e)))?;
        Ok(())
    }

    async fn get(&self, path: &str, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    StorageError::not_found(key)
                } else {
                    StorageError::Failed(format!("Failed to get object {}: {}", key, service))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Failed(format!("Failed to read object body: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn stream(&self, path: &str, key: &str) -> StorageResult<ByteStream> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    StorageError::not_found(key)
                } else {
                    StorageError::Failed(format!(
                        "Failed to get object stream {}: {}",
                        key, service
                    ))
                }
            })?;

        // Chunks arrive in the SDK's native pagination; dropping the stream
        // releases the underlying connection
        let stream = futures::stream::try_unfold(response.body, |mut body| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, body))),
                Ok(None) => Ok(None),
                Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
            }
        });

        Ok(stream.boxed())
    }

    async fn delete(&self, path: &str, key: &str) -> StorageResult<()> {
        // DeleteObject is a silent no-op for absent keys, so existence must
        // be verified first for NOT_FOUND to surface at all
        if !self.exists(path, key).await? {
            return Err(StorageError::not_found(key));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                StorageError::Failed(format!("Failed to delete object {}: {}", key, e))
            })?;

        Ok(())
    }
}
