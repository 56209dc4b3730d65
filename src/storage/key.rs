//! Storage keys and the sharded path layout

use uuid::Uuid;

/// Generate a new random storage key
///
/// 32 lowercase hex characters (a UUIDv4 with the dashes stripped), safe to
/// embed directly in URLs and object paths. Keys are never derived from
/// content: storing identical bytes twice yields two distinct keys.
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Check that a key has the exact shape produced by [`generate_key`]
///
/// Anything else (wrong length, uppercase, non-hex, path separators) is
/// rejected before it can reach a backend path.
pub fn valid_key(key: &str) -> bool {
    key.len() == 32 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Map a key to its sharded storage path
///
/// The first three 2-character groups become directory levels so no single
/// directory accumulates an unbounded number of entries:
/// `ab/cd/ef/abcdef01…`. The same string is used verbatim as the filesystem
/// path suffix and as the object key.
pub fn key_to_path(key: &str) -> String {
    format!("{}/{}/{}/{}", &key[0..2], &key[2..4], &key[4..6], key)
}
