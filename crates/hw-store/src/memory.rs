//! In-process entry store with brute-force cosine similarity.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use hw_core::{Entry, HwError, HwResult, NewEntry};

use crate::{EntryStore, MatchQuery, MatchedEntry};

#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    rows: Mutex<Vec<Entry>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row regardless of owner.
    pub fn all(&self) -> Vec<Entry> {
        self.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Overwrite a row as-is (used to simulate server-side corruption).
    pub fn put_raw(&self, entry: Entry) -> HwResult<()> {
        let mut rows = self.lock()?;
        match rows.iter_mut().find(|r| r.id == entry.id) {
            Some(row) => *row = entry,
            None => rows.push(entry),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> HwResult<MutexGuard<'_, Vec<Entry>>> {
        self.rows
            .lock()
            .map_err(|_| HwError::Other(anyhow::anyhow!("memory store lock poisoned")))
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn insert(&self, entry: NewEntry) -> HwResult<Entry> {
        let stored = entry.into_entry(Utc::now());
        self.lock()?.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: Uuid, entry: NewEntry) -> HwResult<Entry> {
        let mut rows = self.lock()?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id && r.user_id == entry.user_id)
            .ok_or_else(|| HwError::RemoteWrite(format!("no entry {id} for this user")))?;

        row.encrypted_content = entry.encrypted_content;
        row.content_hash = entry.content_hash;
        row.location = entry.location;
        row.word_count = entry.word_count;
        row.embedding = entry.embedding;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn list(&self, user_id: &str) -> HwResult<Vec<Entry>> {
        let mut owned: Vec<Entry> = self
            .lock()?
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> HwResult<()> {
        let mut rows = self.lock()?;
        let before = rows.len();
        rows.retain(|r| !(r.id == id && r.user_id == user_id));
        if rows.len() == before {
            return Err(HwError::RemoteWrite(format!("no entry {id} for this user")));
        }
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> HwResult<u64> {
        let mut rows = self.lock()?;
        let before = rows.len();
        rows.retain(|r| r.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn match_entries(&self, query: &MatchQuery) -> HwResult<Vec<MatchedEntry>> {
        let rows = self.lock()?;
        let mut hits: Vec<MatchedEntry> = rows
            .iter()
            .filter(|r| r.user_id == query.user_id)
            .filter_map(|r| {
                let emb = r.embedding.as_deref()?;
                let similarity = cosine_similarity(&query.embedding, emb)?;
                (similarity >= query.threshold).then(|| MatchedEntry {
                    entry: r.clone(),
                    similarity,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(query.limit);
        Ok(hits)
    }
}

/// Cosine similarity; `None` for mismatched dimensions or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na.sqrt() * nb.sqrt()))
}
