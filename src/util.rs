//! Byte helpers for callers embedding stored content in JSON or data URLs

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode bytes as standard base64
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64 into bytes
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded)
}

/// Wrap already-encoded base64 content as a data URL
pub fn base64_to_data_url(b64: &str, content_type: &str) -> String {
    format!("data:{};base64,{}", content_type, b64)
}
