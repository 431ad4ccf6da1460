// Digest helpers used for logging (never log raw secrets or whole SQL bodies)

use base64::Engine;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest (lowercase). Used to identify executed SQL content in logs.
pub fn sha256_hex(input: &[u8]) -> String {
    format!("{:x}", Sha256::digest(input))
}

/// Fingerprint for a secret value: short base64 SHA-256 prefix, enough to correlate runs.
pub fn secret_fingerprint(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let encoded = base64::engine::general_purpose::STANDARD.encode(digest);
    encoded.chars().take(12).collect()
}
