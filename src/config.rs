//! Configuration management for the Bodega server

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Storage backend configuration
///
/// Exactly one backend is active per service instance; the choice is fixed
/// at construction and never renegotiated per call.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Filesystem(FilesystemConfig),
    Bucket(BucketConfig),
}

#[derive(Debug, Clone)]
pub struct FilesystemConfig {
    /// Base directory files are stored under; created if missing
    pub base_path: PathBuf,
    /// Default Cache-Control header for served objects
    pub cache_control: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub bucket: String,
    /// Endpoint URL, for S3-compatible services like MinIO and R2
    pub endpoint: String,
    pub region: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Path-style addressing, required by MinIO
    pub force_path_style: bool,
    /// Default Cache-Control header for served objects
    pub cache_control: Option<String>,
}

impl StorageConfig {
    pub fn cache_control(&self) -> Option<&str> {
        match self {
            StorageConfig::Filesystem(cfg) => cfg.cache_control.as_deref(),
            StorageConfig::Bucket(cfg) => cfg.cache_control.as_deref(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            storage: StorageConfig::Filesystem(FilesystemConfig {
                base_path: PathBuf::from("./data"),
                cache_control: None,
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let provider = env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "filesystem".to_string());

        let storage = match provider.as_str() {
            "bucket" => StorageConfig::Bucket(BucketConfig {
                bucket: env::var("STORAGE_BUCKET_NAME")?,
                endpoint: env::var("STORAGE_ENDPOINT")?,
                region: env::var("STORAGE_REGION").ok(),
                access_key_id: env::var("STORAGE_ACCESS_KEY_ID").unwrap_or_default(),
                secret_access_key: env::var("STORAGE_SECRET_ACCESS_KEY").unwrap_or_default(),
                force_path_style: matches!(
                    env::var("STORAGE_FORCE_PATH_STYLE").as_deref(),
                    Ok("1") | Ok("true")
                ),
                cache_control: env::var("STORAGE_CACHE_CONTROL").ok(),
            }),
            _ => StorageConfig::Filesystem(FilesystemConfig {
                base_path: PathBuf::from(
                    env::var("STORAGE_BASE_PATH").unwrap_or_else(|_| "./data".to_string()),
                ),
                cache_control: env::var("STORAGE_CACHE_CONTROL").ok(),
            }),
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
            },
            storage,
        })
    }
}
