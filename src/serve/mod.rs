//! HTTP serving adapters
//!
//! Two adapters share one protocol algorithm and differ only in where the
//! bytes come from: [`static_file`] reads a local file (and supports byte
//! ranges), [`stream`] forwards an already-open chunk stream.
//!
//! Shared steps, in order:
//! 1. resolve source existence
//! 2. advertise at-rest encoding (Content-Encoding + Vary)
//! 3. If-None-Match conditional check -> 304
//! 4. main headers (Content-Type, Content-Disposition, ETag,
//!    Cache-Control, Last-Modified, Accept-Ranges)
//! 5. HEAD/OPTIONS short-circuit
//! 6. Range handling (whole-file adapter only)
//! 7. full streamed body

pub mod static_file;
pub mod stream;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::codec::Codec;
use crate::storage::FileMetadata;

/// The slice of an HTTP request the serving adapters need
///
/// Assembled by the routing layer from its extractors; keeps the adapters
/// free of any handler-framework coupling beyond the response type.
#[derive(Debug, Clone)]
pub struct ServeContext {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: ServeQuery,
}

/// Query parameters recognized by the serving entry point
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServeQuery {
    pub download: Option<String>,
    pub inline: Option<String>,
    pub filename: Option<String>,
}

/// Caller-supplied metadata for serving
///
/// All fields optional: the service keeps no catalog, so whatever the
/// caller persisted is whatever can be served.
#[derive(Debug, Clone, Default)]
pub struct ServeMetadata {
    pub filename: Option<String>,
    pub filesize: Option<u64>,
    pub mime_type: Option<String>,
    pub hash: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub encoding: Option<Codec>,
}

impl From<&FileMetadata> for ServeMetadata {
    fn from(meta: &FileMetadata) -> Self {
        ServeMetadata {
            filename: Some(meta.filename.clone()),
            filesize: Some(meta.filesize),
            mime_type: Some(meta.mime_type.clone()),
            hash: Some(meta.hash.clone()),
            last_modified: Some(meta.last_modified),
            encoding: meta.encoding,
        }
    }
}

/// Explicit per-call overrides for the serving options
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub download: Option<bool>,
    pub inline: Option<bool>,
    pub cache_control: Option<String>,
}

/// Fully resolved serving options
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub download: bool,
    pub inline: bool,
    pub cache_control: Option<String>,
    pub filename: String,
}

/// Query flags default on; only an explicit `0` or `false` disables them
fn flag_enabled(value: Option<&str>) -> bool {
    !matches!(value, Some("0") | Some("false"))
}

impl ServeOverrides {
    /// Resolve options from explicit overrides, query fallbacks and the
    /// configured default Cache-Control
    pub fn resolve(
        &self,
        query: &ServeQuery,
        metadata_filename: Option<&str>,
        key: &str,
        default_cache_control: Option<&str>,
    ) -> ServeOptions {
        let filename = match metadata_filename {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => query
                .filename
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| key.to_string()),
        };

        ServeOptions {
            download: self
                .download
                .unwrap_or_else(|| flag_enabled(query.download.as_deref())),
            inline: self
                .inline
                .unwrap_or_else(|| flag_enabled(query.inline.as_deref())),
            cache_control: self
                .cache_control
                .clone()
                .or_else(|| default_cache_control.map(String::from)),
            filename,
        }
    }
}

/// Format a timestamp as an HTTP date (RFC 7231 IMF-fixdate)
pub fn http_date(t: &DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the Content-Disposition header value
///
/// `attachment` wins over `inline`; when neither is requested the header is
/// omitted and the browser decides. Filenames are carried both quoted and
/// RFC 5987 encoded.
pub fn content_disposition(download: bool, inline: bool, filename: &str) -> Option<String> {
    let disposition = if download {
        "attachment"
    } else if inline {
        "inline"
    } else {
        return None;
    };

    if filename.is_empty() {
        return Some(disposition.to_string());
    }

    let encoded = urlencoding::encode(filename);
    Some(format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition, filename, encoded
    ))
}

/// Parse a `Range: bytes=start-end` header against a known size
///
/// Returns an inclusive `(start, end)` pair. The end defaults to the last
/// byte and is clamped to it; anything unparseable or unsatisfiable yields
/// `None` and the caller falls back to a full 200 response.
pub fn parse_range(header: &str, size: u64) -> Option<(u64, u64)> {
    let range = header.strip_prefix("bytes=")?;
    let (start_str, end_str) = range.split_once('-')?;

    let start: u64 = if start_str.is_empty() {
        0
    } else {
        start_str.parse().ok()?
    };
    let mut end: u64 = if end_str.is_empty() {
        size.saturating_sub(1)
    } else {
        end_str.parse().ok()?
    };

    if end >= size {
        end = size.saturating_sub(1);
    }
    if size == 0 || start > end {
        return None;
    }

    Some((start, end))
}

fn insert_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Write the headers shared by both adapters (steps 2 and 4)
pub(crate) fn write_headers(
    headers: &mut HeaderMap,
    metadata: &ServeMetadata,
    options: &ServeOptions,
) {
    // Encoding is preserved as stored; advertise it and key caches on it
    if let Some(codec) = metadata.encoding {
        headers.insert(
            header::CONTENT_ENCODING,
            HeaderValue::from_static(codec.content_encoding()),
        );
        headers.append(header::VARY, HeaderValue::from_static("Accept-Encoding"));
    }

    let mime_type = metadata
        .mime_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    insert_header(headers, header::CONTENT_TYPE, mime_type);

    if options.download || options.inline {
        if let Some(value) = content_disposition(options.download, options.inline, &options.filename)
        {
            insert_header(headers, header::CONTENT_DISPOSITION, &value);
        }
    }

    if let Some(hash) = metadata.hash.as_deref() {
        insert_header(headers, header::ETAG, &format!("\"{}\"", hash));
    }
    if let Some(cache_control) = options.cache_control.as_deref() {
        insert_header(headers, header::CACHE_CONTROL, cache_control);
    }
    if let Some(last_modified) = metadata.last_modified.as_ref() {
        insert_header(headers, header::LAST_MODIFIED, &http_date(last_modified));
    }
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
}

/// Does the request's If-None-Match (quote-stripped) equal the object hash?
pub(crate) fn etag_matches(headers: &HeaderMap, hash: Option<&str>) -> bool {
    let Some(hash) = hash else {
        return false;
    };
    let Some(value) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    value.replace('"', "") == hash
}

/// 304 response carrying the validator headers and no body
pub(crate) fn not_modified(metadata: &ServeMetadata, options: &ServeOptions) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    let headers = response.headers_mut();
    if let Some(hash) = metadata.hash.as_deref() {
        insert_header(headers, header::ETAG, &format!("\"{}\"", hash));
    }
    if let Some(cache_control) = options.cache_control.as_deref() {
        insert_header(headers, header::CACHE_CONTROL, cache_control);
    }
    if let Some(last_modified) = metadata.last_modified.as_ref() {
        insert_header(headers, header::LAST_MODIFIED, &http_date(last_modified));
    }
    response
}

/// Generic 404, leaking nothing about the backend
pub(crate) fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "File not found" })),
    )
        .into_response()
}

/// Generic 500, leaking nothing about the backend
pub(crate) fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}
