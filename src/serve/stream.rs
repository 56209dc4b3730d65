//! Chunked-stream serving adapter
//!
//! Serves an already-open byte stream (the bucket backend's native
//! pagination, or a decode transform). Shares the header and conditional
//! logic with the whole-file adapter; byte ranges are not supported here
//! because the source is already paginated by the backend.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method},
    response::Response,
};

use crate::streams::ByteStream;

use super::{etag_matches, not_modified, write_headers, ServeContext, ServeMetadata, ServeOptions};

/// Serve an open chunk stream as a protocol-complete HTTP response
pub fn serve_stream(
    ctx: &ServeContext,
    stream: ByteStream,
    metadata: &ServeMetadata,
    options: &ServeOptions,
) -> Response {
    // ---- 3. If-None-Match -> 304 ----
    if etag_matches(&ctx.headers, metadata.hash.as_deref()) {
        return not_modified(metadata, options);
    }

    // ---- 2 + 4. Main headers ----
    let mut headers = HeaderMap::new();
    write_headers(&mut headers, metadata, options);

    // filesize describes the original bytes; when the stored form is
    // compressed the body length differs, so the header must be left off
    let content_length = metadata
        .filesize
        .filter(|_| metadata.encoding.is_none());

    // ---- 5. HEAD/OPTIONS: headers only ----
    if ctx.method == Method::HEAD || ctx.method == Method::OPTIONS {
        if let Some(filesize) = content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(filesize));
        }
        let mut response = Response::new(Body::empty());
        *response.headers_mut() = headers;
        return response;
    }

    // ---- 7. Full streamed body ----
    if let Some(filesize) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(filesize));
    }
    let mut response = Response::new(Body::from_stream(stream));
    *response.headers_mut() = headers;
    response
}
