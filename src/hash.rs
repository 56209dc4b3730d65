//! Content hashing

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of a byte buffer as lowercase hex
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that data matches an expected hash
pub fn verify_hash(data: &[u8], expected: &str) -> bool {
    hash_bytes(data) == expected
}
