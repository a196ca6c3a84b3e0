use sha2::{Digest, Sha256};

use crate::models::{Quality, Style};

/// Length of a hex-encoded SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 64;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

pub fn fingerprint(prompt: &str, quality: Quality, style: Style) -> String {
    sha256_hex(format!("{prompt}:{quality}:{style}").as_bytes())
}

/// Key under which an artifact is stored in the key-value store.
pub fn cache_key(fingerprint: &str) -> String {
    format!("model:{fingerprint}")
}

/// Whether `value` has the shape of a fingerprint (64 lowercase hex chars).
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
