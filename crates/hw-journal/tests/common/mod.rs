//! Shared fixtures for journal integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use hw_core::{Entry, HwError, HwResult, NewEntry};
use hw_crypto::{Codec, KdfParams};
use hw_embed::{Embedder, EmbeddingClient};
use hw_journal::{Account, AuthProvider, Journal, LocalAuth, Locator};
use hw_store::{EntryStore, LocalStore, MatchQuery, MatchedEntry, MemoryEntryStore};

pub fn codec() -> Codec {
    Codec::new(KdfParams { iterations: 1_000 })
}

pub fn account() -> Account {
    Account {
        id: "user-1".into(),
        email: "one@example.com".into(),
    }
}

/// Memory store that counts writes and can be made slow or failing.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryEntryStore,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub fail_writes: AtomicBool,
    pub write_delay: Option<Duration>,
}

impl CountingStore {
    pub fn slow(delay: Duration) -> Self {
        Self {
            write_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    async fn before_write(&self) -> HwResult<()> {
        if let Some(d) = self.write_delay {
            tokio::time::sleep(d).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HwError::RemoteWrite("503 service unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EntryStore for CountingStore {
    async fn insert(&self, entry: NewEntry) -> HwResult<Entry> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        self.inner.insert(entry).await
    }

    async fn update(&self, id: Uuid, entry: NewEntry) -> HwResult<Entry> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        self.inner.update(id, entry).await
    }

    async fn list(&self, user_id: &str) -> HwResult<Vec<Entry>> {
        self.inner.list(user_id).await
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> HwResult<()> {
        self.inner.delete(user_id, id).await
    }

    async fn delete_all(&self, user_id: &str) -> HwResult<u64> {
        self.inner.delete_all(user_id).await
    }

    async fn match_entries(&self, query: &MatchQuery) -> HwResult<Vec<MatchedEntry>> {
        self.inner.match_entries(query).await
    }
}

/// Auth provider that records sign-in requests.
pub struct RecordingAuth {
    pub inner: LocalAuth,
    pub sign_ins: AtomicUsize,
}

impl RecordingAuth {
    pub fn open(slots: Arc<dyn LocalStore>) -> Self {
        Self {
            inner: LocalAuth::open(slots).unwrap(),
            sign_ins: AtomicUsize::new(0),
        }
    }

    pub fn sign_ins(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for RecordingAuth {
    fn current_account(&self) -> Option<Account> {
        self.inner.current_account()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Account>> {
        self.inner.subscribe()
    }

    async fn sign_in(&self) -> HwResult<()> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_in().await
    }

    async fn sign_out(&self) -> HwResult<()> {
        self.inner.sign_out().await
    }
}

/// Locator that counts lookups.
pub struct CountingLocator {
    pub label: String,
    pub calls: AtomicUsize,
}

impl CountingLocator {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Locator for CountingLocator {
    async fn locate(&self) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.label.clone()
    }
}

/// Embedder answering from a fixed table; unknown text is an error.
pub struct TableEmbedder(pub HashMap<String, Vec<f32>>);

#[async_trait]
impl Embedder for TableEmbedder {
    async fn embed(&self, text: &str) -> HwResult<Vec<f32>> {
        self.0
            .get(text)
            .cloned()
            .ok_or_else(|| HwError::Embedding(format!("no vector for {} chars", text.len())))
    }

    fn model(&self) -> &str {
        "table"
    }
}

pub fn journal(
    store: Arc<dyn EntryStore>,
    slots: Arc<dyn LocalStore>,
    auth: Arc<dyn AuthProvider>,
    embedder: EmbeddingClient,
) -> Journal {
    Journal::new(store, embedder, slots, auth, codec()).unwrap()
}
