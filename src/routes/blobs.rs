//! Blob storage API routes
//!
//! The service keeps no catalog, so the blob GET route serves without
//! stored metadata; callers that persisted a [`FileMetadata`] record serve
//! through their own handler and pass it along (see
//! [`StorageService::serve_with_metadata`]).

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::codec::Codec;
use crate::error::{AppError, Result};
use crate::serve::{ServeContext, ServeMetadata, ServeOverrides, ServeQuery};
use crate::state::AppState;
use crate::storage::{FileMetadata, UploadFile};

/// Create the blob storage router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/blob/:key", get(get_blob))
        .route("/blob/:key", delete(delete_blob))
}

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    /// `gzip`, `zstd`, or a bare truthy flag for the default algorithm
    compress: Option<String>,
}

/// Store a multipart upload and return its metadata record
async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<FileMetadata>> {
    let compress = query.compress.as_deref().and_then(Codec::from_param);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("attachment").to_string();
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let metadata = state
            .storage()
            .store_file(
                UploadFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                },
                compress,
            )
            .await?;
        return Ok(Json(metadata));
    }

    Err(AppError::BadRequest("No data provided to store".to_string()))
}

/// Serve a stored blob
async fn get_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<ServeQuery>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let ctx = ServeContext {
        method,
        headers,
        query,
    };
    state
        .storage()
        .serve(ctx, &key, ServeMetadata::default(), ServeOverrides::default())
        .await
}

/// Delete a stored blob
async fn delete_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode> {
    state.storage().delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::config::{Config, FilesystemConfig, StorageConfig};
    use crate::hash::hash_bytes;
    use crate::serve::stream::serve_stream;
    use crate::storage::{StorageService, StoreMeta};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

    async fn test_service(dir: &TempDir) -> StorageService {
        StorageService::new(StorageConfig::Filesystem(FilesystemConfig {
            base_path: dir.path().to_path_buf(),
            cache_control: None,
        }))
        .await
        .unwrap()
    }

    async fn test_app(dir: &TempDir) -> Router {
        let config = Config::default();
        let storage = test_service(dir).await;
        Router::new()
            .nest("/api/v1/storage", router())
            .with_state(AppState::new(config, storage))
    }

    fn multipart_request(uri: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_upload_get_delete_cycle() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir).await;
        let data = b"uploaded bytes".to_vec();

        let response = app
            .clone()
            .oneshot(multipart_request(
                "/api/v1/storage/upload",
                "note.txt",
                "text/plain",
                &data,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let metadata: FileMetadata =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(metadata.filename, "note.txt");
        assert_eq!(metadata.mime_type, "text/plain");
        assert_eq!(metadata.filesize, data.len() as u64);
        assert_eq!(metadata.hash, hash_bytes(&data));
        assert_eq!(metadata.encoding, None);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/storage/blob/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, data);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/storage/blob/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Absent after delete, for both DELETE and GET
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/storage/blob/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/storage/blob/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir).await;

        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n");
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/storage/upload")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", BOUNDARY),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_with_compression() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir).await;
        let data = b"compress me please, there is plenty of repetition here. ".repeat(16);

        let response = app
            .clone()
            .oneshot(multipart_request(
                "/api/v1/storage/upload?compress=zstd",
                "log.txt",
                "text/plain",
                &data,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let metadata: FileMetadata =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(metadata.encoding, Some(Codec::Zstd));
        assert_eq!(metadata.filesize, data.len() as u64);

        // The raw blob route returns the stored (compressed) form
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/storage/blob/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let raw = body_bytes(response).await;
        assert_ne!(raw, data);
        assert_eq!(codec::decompress(Codec::Zstd, &raw).unwrap(), data);
    }

    // ------------------------------------------------------------------
    // Serving with caller-persisted metadata
    // ------------------------------------------------------------------

    #[derive(Clone)]
    struct FixtureState {
        storage: Arc<StorageService>,
        metadata: FileMetadata,
    }

    async fn serve_fixture(
        State(state): State<FixtureState>,
        Path(key): Path<String>,
        Query(query): Query<ServeQuery>,
        method: Method,
        headers: HeaderMap,
    ) -> Response {
        let ctx = ServeContext {
            method,
            headers,
            query,
        };
        state
            .storage
            .serve(
                ctx,
                &key,
                ServeMetadata::from(&state.metadata),
                ServeOverrides::default(),
            )
            .await
    }

    /// Stream the stored blob through the decode transform and serve the
    /// decompressed bytes, the way a caller undoes at-rest compression
    async fn serve_fixture_decoded(
        State(state): State<FixtureState>,
        Path(key): Path<String>,
        Query(query): Query<ServeQuery>,
        method: Method,
        headers: HeaderMap,
    ) -> Response {
        let codec = match state.metadata.encoding {
            Some(codec) => codec,
            None => return crate::serve::internal_error(),
        };
        let stream = match state.storage.stream(&key, Some(codec)).await {
            Ok(stream) => stream,
            Err(_) => return crate::serve::not_found(),
        };
        let ctx = ServeContext {
            method,
            headers,
            query,
        };
        // No encoding in the serve metadata: the compression was undone
        let metadata = ServeMetadata {
            encoding: None,
            filesize: None,
            ..ServeMetadata::from(&state.metadata)
        };
        let options = ServeOverrides::default().resolve(
            &ctx.query,
            metadata.filename.as_deref(),
            &key,
            None,
        );
        serve_stream(&ctx, stream, &metadata, &options)
    }

    async fn fixture_app(
        dir: &TempDir,
        data: &[u8],
        compress: Option<Codec>,
    ) -> (Router, FileMetadata) {
        let storage = Arc::new(test_service(dir).await);
        let metadata = storage
            .store_with_metadata(
                data,
                StoreMeta {
                    filename: Some("fixture.bin".to_string()),
                    mime_type: Some("application/octet-stream".to_string()),
                },
                compress,
            )
            .await
            .unwrap();

        let state = FixtureState {
            storage,
            metadata: metadata.clone(),
        };
        let app = Router::new()
            .route("/storage/:key", get(serve_fixture))
            .route("/decoded/:key", get(serve_fixture_decoded))
            .with_state(state);
        (app, metadata)
    }

    fn range_fixture() -> Vec<u8> {
        (0..1000).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_serve_full_response() {
        let dir = TempDir::new().unwrap();
        let data = range_fixture();
        let (app, metadata) = fixture_app(&dir, &data, None).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(
            headers.get(header::ETAG).unwrap(),
            &format!("\"{}\"", metadata.hash)
        );
        assert_eq!(headers.get(header::ACCEPT_RANGES).unwrap(), "bytes");
        assert_eq!(
            headers.get(header::CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        assert_eq!(
            headers.get(header::CONTENT_LENGTH).unwrap(),
            &data.len().to_string()
        );
        // download defaults on, so the stored filename rides along
        let disposition = headers.get(header::CONTENT_DISPOSITION).unwrap();
        assert!(disposition
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"fixture.bin\""));
        assert!(headers.get(header::LAST_MODIFIED).is_some());

        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn test_serve_unknown_key_404() {
        let dir = TempDir::new().unwrap();
        let (app, _metadata) = fixture_app(&dir, b"present", None).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}", "d".repeat(32)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_conditional_304() {
        let dir = TempDir::new().unwrap();
        let data = range_fixture();
        let (app, metadata) = fixture_app(&dir, &data, None).await;

        // Quoted validator, the usual browser form
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}", metadata.key))
                    .header(header::IF_NONE_MATCH, format!("\"{}\"", metadata.hash))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(
            response.headers().get(header::ETAG).unwrap(),
            &format!("\"{}\"", metadata.hash)
        );
        assert!(body_bytes(response).await.is_empty());

        // Unquoted validator matches too
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}", metadata.key))
                    .header(header::IF_NONE_MATCH, metadata.hash.clone())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        // A stale validator gets the full body
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}", metadata.key))
                    .header(header::IF_NONE_MATCH, "\"someotherhash\"")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn test_serve_range() {
        let dir = TempDir::new().unwrap();
        let data = range_fixture();
        let (app, metadata) = fixture_app(&dir, &data, None).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}", metadata.key))
                    .header(header::RANGE, "bytes=0-99")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 0-99/1000"
        );
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "100");
        assert_eq!(body_bytes(response).await, &data[0..100]);
    }

    #[tokio::test]
    async fn test_serve_range_open_end() {
        let dir = TempDir::new().unwrap();
        let data = range_fixture();
        let (app, metadata) = fixture_app(&dir, &data, None).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}", metadata.key))
                    .header(header::RANGE, "bytes=900-")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 900-999/1000"
        );
        assert_eq!(body_bytes(response).await, &data[900..]);
    }

    #[tokio::test]
    async fn test_serve_head() {
        let dir = TempDir::new().unwrap();
        let data = range_fixture();
        let (app, metadata) = fixture_app(&dir, &data, None).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("HEAD")
                    .uri(format!("/storage/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "1000"
        );
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_serve_disposition_overrides() {
        let dir = TempDir::new().unwrap();
        let data = b"disposition fixture".to_vec();
        let (app, metadata) = fixture_app(&dir, &data, None).await;

        // filename query loses to the stored filename, attachment rides on
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/storage/{}?download=1&filename=test.jpg",
                        metadata.key
                    ))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("attachment"));
        assert!(disposition.contains("fixture.bin"));

        // Disabling both flags drops the header entirely
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}?download=0&inline=0", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }

    #[tokio::test]
    async fn test_serve_encoded_blob() {
        let dir = TempDir::new().unwrap();
        let data = b"served exactly as stored, compressed. ".repeat(24);
        let (app, metadata) = fixture_app(&dir, &data, Some(Codec::Gzip)).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/storage/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );
        let vary = response
            .headers()
            .get(header::VARY)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(vary.contains("Accept-Encoding"));

        let body = body_bytes(response).await;
        assert_ne!(body, data);
        assert_eq!(codec::decompress(Codec::Gzip, &body).unwrap(), data);
    }

    #[tokio::test]
    async fn test_serve_transparent_decode() {
        let dir = TempDir::new().unwrap();
        let data = b"transparently decompressed on the way out. ".repeat(24);
        let (app, metadata) = fixture_app(&dir, &data, Some(Codec::Gzip)).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/decoded/{}", metadata.key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        assert_eq!(body_bytes(response).await, data);
    }
}
