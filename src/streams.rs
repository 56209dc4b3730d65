//! Utilities for working with byte streams

use std::io;

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};

/// Boxed stream of byte chunks
///
/// The common currency between the storage backends, the streaming codec
/// and the HTTP serving layer.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Read an entire stream into a single buffer
pub async fn stream_to_bytes<S>(stream: S) -> io::Result<Vec<u8>>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut stream = Box::pin(stream);
    let mut out = Vec::new();
    while let Some(chunk) = stream.try_next().await? {
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

/// Wrap a buffer as a single-chunk stream
pub fn bytes_to_stream(bytes: Vec<u8>) -> ByteStream {
    stream::once(async move { Ok(Bytes::from(bytes)) }).boxed()
}
