//! hw-embed: text → embedding vector
//!
//! `Embedder` is the provider seam; `EmbeddingClient` wraps one and makes it
//! fail-soft: any provider failure becomes an empty vector, which callers read
//! as "no semantic index for this text". There is no retry.

pub mod openai;

pub use openai::OpenAiEmbedder;

use async_trait::async_trait;
use std::sync::Arc;

use hw_core::{HwError, HwResult};

/// An external text-embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`. Errors are `HwError::Embedding`.
    async fn embed(&self, text: &str) -> HwResult<Vec<f32>>;

    fn model(&self) -> &str;
}

/// Provider stand-in used when embeddings are disabled or unconfigured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> HwResult<Vec<f32>> {
        Err(HwError::Embedding("embeddings are disabled".into()))
    }

    fn model(&self) -> &str {
        "disabled"
    }
}

/// Fail-soft wrapper around an [`Embedder`].
#[derive(Clone)]
pub struct EmbeddingClient {
    inner: Arc<dyn Embedder>,
}

impl EmbeddingClient {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledEmbedder))
    }

    /// Single provider call; empty vector on any failure.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        match self.inner.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(model = self.inner.model(), error = %e, "embedding unavailable");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("model", &self.inner.model())
            .finish()
    }
}
