//! Decrypt-on-search pipeline.
//!
//! The query is embedded in plaintext, matched server-side against stored
//! embeddings, and every returned row is decrypted locally. A row that fails
//! to decrypt is kept with a placeholder so the hit count never changes.

use std::sync::Arc;

use hw_core::config::SearchConfig;
use hw_core::{SearchHit, DECRYPTION_FAILED_PLACEHOLDER};
use hw_crypto::{Codec, UserSecret};
use hw_embed::EmbeddingClient;
use hw_store::{EntryStore, MatchQuery};

use crate::writer::decrypt_rows;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub threshold: f32,
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            limit: 5,
        }
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(cfg: &SearchConfig) -> Self {
        Self {
            threshold: cfg.threshold,
            limit: cfg.limit,
        }
    }
}

#[derive(Clone)]
pub struct SearchPipeline {
    store: Arc<dyn EntryStore>,
    embedder: EmbeddingClient,
    codec: Codec,
}

impl SearchPipeline {
    pub fn new(store: Arc<dyn EntryStore>, embedder: EmbeddingClient, codec: Codec) -> Self {
        Self {
            store,
            embedder,
            codec,
        }
    }

    /// Best matches for `query` among `owner_id`'s entries, decrypted.
    ///
    /// Fail-soft: an unavailable embedding or a store error yields no hits.
    pub async fn search(
        &self,
        query: &str,
        owner_id: &str,
        secret: &Arc<UserSecret>,
        opts: SearchOptions,
    ) -> Vec<SearchHit> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let embedding = self.embedder.embed(query).await;
        if embedding.is_empty() {
            tracing::warn!("no query embedding; search skipped");
            return Vec::new();
        }

        let matched = match self
            .store
            .match_entries(&MatchQuery {
                embedding,
                threshold: opts.threshold,
                limit: opts.limit,
                user_id: owner_id.to_string(),
            })
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "similarity search failed");
                return Vec::new();
            }
        };
        tracing::debug!(hits = matched.len(), "similarity search returned");

        let rows = matched
            .into_iter()
            .map(|m| (m.entry, Some(m.similarity)))
            .collect();
        match decrypt_rows(self.codec, rows, secret, DECRYPTION_FAILED_PLACEHOLDER).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!(error = %e, "decrypting search results failed");
                Vec::new()
            }
        }
    }
}
