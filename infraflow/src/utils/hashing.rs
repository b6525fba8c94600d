//! Deterministic hashing helpers for logical ids and template digests.

use md5::{Digest as _, Md5};
use sha2::Sha256;

/// Length of the hash suffix appended to multi-segment logical ids.
const LOGICAL_ID_HASH_LEN: usize = 8;

/// Builds a stable logical id from a construct path.
///
/// A single segment is used verbatim (minus non-alphanumerics). Longer paths
/// get the concatenated segments plus an 8-character uppercase MD5 suffix of
/// the `/`-joined path, so two paths that sanitize to the same prefix still
/// get distinct ids.
#[must_use]
pub fn logical_id(path: &[&str]) -> String {
    let human: String = path
        .iter()
        .flat_map(|segment| segment.chars())
        .filter(char::is_ascii_alphanumeric)
        .collect();

    if path.len() <= 1 {
        return human;
    }

    let mut hasher = Md5::new();
    hasher.update(path.join("/").as_bytes());
    let digest = hex::encode_upper(hasher.finalize());
    format!("{human}{}", &digest[..LOGICAL_ID_HASH_LEN])
}

/// Hex-encoded SHA-256 of the given bytes.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
