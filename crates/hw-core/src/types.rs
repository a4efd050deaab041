use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recorded location when the user has not opted in, and for every entry
/// reconciled from a pre-authentication composition.
pub const NO_LOCATION_SAVED: &str = "No location saved";

/// Returned by a locator that could not resolve a position in time.
pub const LOCATION_UNAVAILABLE: &str = "Location unavailable";

/// Content substituted for a search hit whose ciphertext fails to decrypt.
pub const DECRYPTION_FAILED_PLACEHOLDER: &str = "[Decryption failed]";

/// Content substituted for a listed entry whose ciphertext fails to decrypt.
pub const LIST_DECRYPTION_FAILED_PLACEHOLDER: &str =
    "[Decryption failed - content may be corrupted]";

/// A persisted journal entry, as stored remotely.
///
/// `encrypted_content` is the only representation of the text that ever
/// leaves the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: String,
    /// base64(salt ‖ nonce ‖ ciphertext+tag)
    pub encrypted_content: String,
    /// SHA-256 of the trimmed plaintext, lowercase hex
    #[serde(default)]
    pub content_hash: Option<String>,
    pub location: String,
    pub word_count: u32,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert / update payload for an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub user_id: String,
    pub encrypted_content: String,
    pub content_hash: Option<String>,
    pub location: String,
    pub word_count: u32,
    pub embedding: Option<Vec<f32>>,
}

impl NewEntry {
    /// Materialize into a stored row with a fresh id and timestamps.
    pub fn into_entry(self, now: DateTime<Utc>) -> Entry {
        Entry {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            encrypted_content: self.encrypted_content,
            content_hash: self.content_hash,
            location: self.location,
            word_count: self.word_count,
            embedding: self.embedding,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An entry with its content decrypted for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub entry: Entry,
    pub content: String,
    /// Cosine similarity reported by the store (absent for plain listings)
    pub similarity: Option<f32>,
}

/// Number of whitespace-separated words in the trimmed text.
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("Hello world"), 2);
        assert_eq!(word_count("  Hello \n\t world  "), 2);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("one"), 1);
    }

    #[test]
    fn test_entry_deserializes_without_optional_fields() {
        let json = r#"{
            "id": "6f1c1f0e-9a5e-4bb4-8a3c-6f3d1c9c2b11",
            "user_id": "user-1",
            "encrypted_content": "AAAA",
            "location": "No location saved",
            "word_count": 3,
            "created_at": "2026-01-02T03:04:05Z",
            "updated_at": "2026-01-02T03:04:05Z"
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.user_id, "user-1");
        assert!(entry.content_hash.is_none());
        assert!(entry.embedding.is_none());
        assert_eq!(entry.word_count, 3);
    }

    #[test]
    fn test_into_entry_stamps_both_timestamps() {
        let now = Utc::now();
        let entry = NewEntry {
            user_id: "u".into(),
            encrypted_content: "blob".into(),
            content_hash: None,
            location: NO_LOCATION_SAVED.into(),
            word_count: 0,
            embedding: None,
        }
        .into_entry(now);

        assert_eq!(entry.created_at, now);
        assert_eq!(entry.updated_at, now);
    }
}
