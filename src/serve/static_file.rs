//! Whole-file serving adapter
//!
//! Serves a blob straight from the local filesystem. The only adapter with
//! byte-range support: slices are read with a seek + take so only the
//! requested window ever leaves the disk.

use std::io::SeekFrom;
use std::path::Path;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::Response,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::{
    etag_matches, internal_error, not_found, not_modified, parse_range, write_headers,
    ServeContext, ServeMetadata, ServeOptions,
};

/// Serve a file from disk as a protocol-complete HTTP response
pub async fn serve_static(
    ctx: &ServeContext,
    path: &Path,
    metadata: &ServeMetadata,
    options: &ServeOptions,
) -> Response {
    // ---- 1. Stat the file ----
    let stat = match tokio::fs::metadata(path).await {
        Ok(stat) if stat.is_file() => stat,
        _ => return not_found(),
    };
    let size = stat.len();

    // ---- 3. If-None-Match -> 304 ----
    if etag_matches(&ctx.headers, metadata.hash.as_deref()) {
        return not_modified(metadata, options);
    }

    // ---- 2 + 4. Main headers ----
    let mut headers = HeaderMap::new();
    write_headers(&mut headers, metadata, options);

    // ---- 5. HEAD/OPTIONS: headers only ----
    if ctx.method == Method::HEAD || ctx.method == Method::OPTIONS {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        return with_headers(Response::new(Body::empty()), headers);
    }

    // ---- 6. Range requests ----
    let range = ctx
        .headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, size));
    if let Some((start, end)) = range {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("Failed to open {} for range read: {}", path.display(), e);
                return internal_error();
            }
        };
        if let Err(e) = file.seek(SeekFrom::Start(start)).await {
            tracing::error!("Failed to seek {}: {}", path.display(), e);
            return internal_error();
        }

        let chunk_size = end - start + 1;
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(chunk_size));
        if let Ok(value) =
            HeaderValue::from_str(&format!("bytes {}-{}/{}", start, end, size))
        {
            headers.insert(header::CONTENT_RANGE, value);
        }

        let body = Body::from_stream(ReaderStream::new(file.take(chunk_size)));
        let mut response = with_headers(Response::new(body), headers);
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        return response;
    }

    // ---- 7. Full streamed body ----
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", path.display(), e);
            return internal_error();
        }
    };
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    with_headers(
        Response::new(Body::from_stream(ReaderStream::new(file))),
        headers,
    )
}

fn with_headers(mut response: Response, headers: HeaderMap) -> Response {
    *response.headers_mut() = headers;
    response
}
