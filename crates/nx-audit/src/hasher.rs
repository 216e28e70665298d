// hasher.rs - SHA-256 helpers, lowercase hex encoded.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes into a 64-character lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}
