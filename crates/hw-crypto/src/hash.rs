//! SHA-256 content digest of entry text

use sha2::{Digest, Sha256};

/// Hex SHA-256 of the trimmed text: always 64 lowercase hex characters.
///
/// Computed over plaintext before encryption; stored alongside the blob for
/// later integrity/dedupe checks.
pub fn content_hash(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.trim().as_bytes()))
}
