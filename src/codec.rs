//! Compression codecs
//!
//! Two interchangeable algorithms: gzip for fast, cheap compression and
//! zstd for dense at-rest storage. Each is exposed as synchronous and
//! asynchronous whole-buffer operations plus a streaming decoder that
//! transforms a chunk stream without materializing the payload.

use std::io::{self, Write};

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Compression algorithm identifier
///
/// Doubles as the `encoding` marker in stored-object metadata and as the
/// HTTP `Content-Encoding` token when compressed bytes are delivered as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Gzip,
    Zstd,
}

impl Codec {
    /// HTTP content-coding token for this algorithm
    pub fn content_encoding(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Zstd => "zstd",
        }
    }

    /// Parse a compression request parameter
    ///
    /// `"gzip"` and `"zstd"` select an algorithm explicitly; bare truthy
    /// flags select zstd. Anything else disables compression.
    pub fn from_param(value: &str) -> Option<Codec> {
        match value {
            "gzip" => Some(Codec::Gzip),
            "zstd" | "1" | "true" => Some(Codec::Zstd),
            _ => None,
        }
    }
}

const GZIP_DEFAULT_LEVEL: u32 = 6;

/// Compression level selector
///
/// `Precise` levels outside the algorithm's valid range fall back to the
/// algorithm's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    Min,
    #[default]
    Default,
    Max,
    Precise(i32),
}

impl Level {
    fn gzip(self) -> flate2::Compression {
        match self {
            Level::Min => flate2::Compression::fast(),
            Level::Default => flate2::Compression::new(GZIP_DEFAULT_LEVEL),
            Level::Max => flate2::Compression::best(),
            Level::Precise(n) if (1..=9).contains(&n) => flate2::Compression::new(n as u32),
            Level::Precise(_) => flate2::Compression::new(GZIP_DEFAULT_LEVEL),
        }
    }

    fn zstd(self) -> i32 {
        match self {
            Level::Min => 1,
            Level::Default => zstd::DEFAULT_COMPRESSION_LEVEL,
            Level::Max => *zstd::compression_level_range().end(),
            Level::Precise(n) if zstd::compression_level_range().contains(&n) => n,
            Level::Precise(_) => zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Compress a whole buffer
pub fn compress(codec: Codec, level: Level, input: &[u8]) -> io::Result<Vec<u8>> {
    match codec {
        Codec::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), level.gzip());
            encoder.write_all(input)?;
            encoder.finish()
        }
        Codec::Zstd => zstd::encode_all(input, level.zstd()),
    }
}

/// Decompress a whole buffer
pub fn decompress(codec: Codec, input: &[u8]) -> io::Result<Vec<u8>> {
    match codec {
        Codec::Gzip => {
            let mut decoder = flate2::write::GzDecoder::new(Vec::new());
            decoder.write_all(input)?;
            decoder.finish()
        }
        Codec::Zstd => zstd::decode_all(input),
    }
}

/// Compress a whole buffer off the async runtime
pub async fn compress_async(codec: Codec, level: Level, input: Vec<u8>) -> io::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || compress(codec, level, &input))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Decompress a whole buffer off the async runtime
pub async fn decompress_async(codec: Codec, input: Vec<u8>) -> io::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || decompress(codec, &input))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Incremental decoder fed one compressed chunk at a time
///
/// Wraps the write side of the platform decoders so a chunk stream can be
/// decompressed as it arrives.
pub struct ChunkDecoder {
    inner: DecoderInner,
}

enum DecoderInner {
    Gzip(flate2::write::GzDecoder<Vec<u8>>),
    Zstd(zstd::stream::write::Decoder<'static, Vec<u8>>),
}

impl ChunkDecoder {
    pub fn new(codec: Codec) -> io::Result<Self> {
        let inner = match codec {
            Codec::Gzip => DecoderInner::Gzip(flate2::write::GzDecoder::new(Vec::new())),
            Codec::Zstd => DecoderInner::Zstd(zstd::stream::write::Decoder::new(Vec::new())?),
        };
        Ok(Self { inner })
    }

    /// Feed a compressed chunk, returning whatever decompressed bytes are
    /// available so far (possibly empty)
    pub fn write(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        match &mut self.inner {
            DecoderInner::Gzip(decoder) => {
                decoder.write_all(chunk)?;
                Ok(std::mem::take(decoder.get_mut()).into())
            }
            DecoderInner::Zstd(decoder) => {
                decoder.write_all(chunk)?;
                decoder.flush()?;
                Ok(std::mem::take(decoder.get_mut()).into())
            }
        }
    }

    /// Signal end of input and drain the remaining decompressed bytes
    pub fn finish(self) -> io::Result<Bytes> {
        match self.inner {
            DecoderInner::Gzip(decoder) => Ok(decoder.finish()?.into()),
            DecoderInner::Zstd(mut decoder) => {
                decoder.flush()?;
                Ok(std::mem::take(decoder.get_mut()).into())
            }
        }
    }
}

/// Lift a [`ChunkDecoder`] over a stream of compressed chunks
///
/// Output chunks are produced as input chunks arrive, so backpressure is
/// driven by the consumer; dropping the returned stream drops the source.
pub fn decode_stream<S>(codec: Codec, input: S) -> BoxStream<'static, io::Result<Bytes>>
where
    S: Stream<Item = io::Result<Bytes>> + Send + Unpin + 'static,
{
    let decoder = match ChunkDecoder::new(codec) {
        Ok(decoder) => decoder,
        Err(e) => return stream::once(async move { Err(e) }).boxed(),
    };

    stream::try_unfold((input, Some(decoder)), |(mut input, mut slot)| async move {
        loop {
            let Some(mut decoder) = slot.take() else {
                return Ok(None);
            };
            match input.next().await {
                Some(Ok(chunk)) => {
                    let out = decoder.write(&chunk)?;
                    slot = Some(decoder);
                    if out.is_empty() {
                        continue;
                    }
                    return Ok(Some((out, (input, slot))));
                }
                Some(Err(e)) => return Err(e),
                None => {
                    // Input exhausted: drain the decoder tail, leaving the
                    // slot empty so the next poll terminates the stream
                    let out = decoder.finish()?;
                    if out.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some((out, (input, slot))));
                }
            }
        }
    })
    .boxed()
}
