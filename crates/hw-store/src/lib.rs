//! hw-store: persistence boundaries for hellowords
//!
//! Two kinds of storage live here:
//!   - **Remote entries** (`EntryStore`): the table of encrypted entries and
//!     the server-side similarity search. Backends: in-memory and REST.
//!   - **Local slots** (`LocalStore`): a small durable key-value store for the
//!     pending entry, the draft, preferences and the signed-in session.
//!
//! Nothing in this crate ever sees plaintext entry content except the local
//! pending/draft slots, which never leave the device.

pub mod local;
pub mod memory;
pub mod rest;

pub use local::{slots, JsonSlotStore, LocalStore, MemorySlotStore};
pub use memory::MemoryEntryStore;
pub use rest::{RestConfig, RestEntryStore};

use async_trait::async_trait;
use hw_core::{Entry, HwResult, NewEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parameters of a server-side similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    pub embedding: Vec<f32>,
    /// Minimum cosine similarity
    pub threshold: f32,
    /// Maximum rows returned
    pub limit: usize,
    /// Only rows owned by this user
    pub user_id: String,
}

/// A row returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedEntry {
    #[serde(flatten)]
    pub entry: Entry,
    pub similarity: f32,
}

/// Remote table of encrypted entries.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert a new entry and return the stored row.
    async fn insert(&self, entry: NewEntry) -> HwResult<Entry>;

    /// Replace the content of an existing entry, stamping `updated_at`.
    async fn update(&self, id: Uuid, entry: NewEntry) -> HwResult<Entry>;

    /// All entries owned by `user_id`, newest first.
    async fn list(&self, user_id: &str) -> HwResult<Vec<Entry>>;

    async fn delete(&self, user_id: &str, id: Uuid) -> HwResult<()>;

    /// Delete every entry owned by `user_id`; returns how many were removed.
    async fn delete_all(&self, user_id: &str) -> HwResult<u64>;

    /// Rows with cosine similarity >= threshold, best first, at most `limit`.
    async fn match_entries(&self, query: &MatchQuery) -> HwResult<Vec<MatchedEntry>>;
}
