//! Bodega - content-addressable byte storage service
//!
//! A storage core with interchangeable filesystem and S3-compatible
//! backends, optional at-rest compression, and HTTP serving with
//! conditional caching and byte-range delivery. Callers persist the
//! [`FileMetadata`] a store hands back; the service itself keeps no
//! catalog.

pub mod codec;
pub mod config;
pub mod error;
pub mod hash;
pub mod routes;
pub mod serve;
pub mod state;
pub mod storage;
pub mod streams;
pub mod util;

pub use codec::{Codec, Level};
pub use error::{AppError, StorageError, StorageResult};
pub use hash::hash_bytes;
pub use serve::{ServeContext, ServeMetadata, ServeOptions, ServeOverrides, ServeQuery};
pub use storage::{FileMetadata, StorageService, StoreMeta, UploadFile};
