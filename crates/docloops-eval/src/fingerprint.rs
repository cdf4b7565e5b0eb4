use sha2::{Digest, Sha256};

/// SHA-256 hex digest of document content. History and caches store this,
/// never the raw content.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Shortened fingerprint for identifiers and file names
pub fn short_fingerprint(content: &str) -> String {
    fingerprint(content)[..12].to_string()
}
