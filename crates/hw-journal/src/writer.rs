//! Turns composed text into an encrypted record and persists it.
//!
//! Hash and embedding are computed over the trimmed plaintext; only the
//! ciphertext, digest, embedding and metadata cross the store boundary.

use std::sync::Arc;
use uuid::Uuid;

use hw_core::{word_count, Entry, HwError, HwResult, NewEntry, SearchHit};
use hw_crypto::{content_hash, Codec, UserSecret};
use hw_embed::EmbeddingClient;
use hw_store::EntryStore;

use crate::auth::ActiveSession;

#[derive(Clone)]
pub struct EntryWriter {
    store: Arc<dyn EntryStore>,
    codec: Codec,
    embedder: EmbeddingClient,
}

impl EntryWriter {
    pub fn new(store: Arc<dyn EntryStore>, codec: Codec, embedder: EmbeddingClient) -> Self {
        Self {
            store,
            codec,
            embedder,
        }
    }

    /// Build the record for `content` and perform exactly one insert, or one
    /// update when `editing` names an existing entry.
    pub async fn write(
        &self,
        content: &str,
        editing: Option<Uuid>,
        location: String,
        session: &ActiveSession,
    ) -> HwResult<Entry> {
        let record = self.build(content, location, session).await?;
        match editing {
            Some(id) => {
                tracing::debug!(entry = %id, "updating entry");
                self.store.update(id, record).await
            }
            None => self.store.insert(record).await,
        }
    }

    async fn build(
        &self,
        content: &str,
        location: String,
        session: &ActiveSession,
    ) -> HwResult<NewEntry> {
        let text = content.trim().to_string();

        let encrypted_content = encrypt_blocking(self.codec, text.clone(), session.secret()).await?;
        let embedding = self.embedder.embed(&text).await;

        Ok(NewEntry {
            user_id: session.user_id().to_string(),
            encrypted_content,
            content_hash: Some(content_hash(&text)),
            location,
            word_count: word_count(&text),
            embedding: (!embedding.is_empty()).then_some(embedding),
        })
    }
}

/// Run the key stretch + AEAD off the async executor.
async fn encrypt_blocking(codec: Codec, text: String, secret: &Arc<UserSecret>) -> HwResult<String> {
    let secret = Arc::clone(secret);
    tokio::task::spawn_blocking(move || codec.encrypt(&text, &secret))
        .await
        .map_err(|e| HwError::Other(anyhow::anyhow!("encrypt task failed: {e}")))?
        .map_err(HwError::Other)
}

/// Decrypt a single blob; failure is an error rather than a placeholder.
pub(crate) async fn decrypt_one(codec: Codec, blob: String, secret: &Arc<UserSecret>) -> HwResult<String> {
    let secret = Arc::clone(secret);
    let plain = tokio::task::spawn_blocking(move || codec.decrypt(&blob, &secret))
        .await
        .map_err(|e| HwError::Other(anyhow::anyhow!("decrypt task failed: {e}")))??;
    Ok(plain)
}

/// Decrypt rows in parallel, substituting `placeholder` for any row that
/// fails. Output order and length always match the input.
pub(crate) async fn decrypt_rows(
    codec: Codec,
    rows: Vec<(Entry, Option<f32>)>,
    secret: &Arc<UserSecret>,
    placeholder: &'static str,
) -> HwResult<Vec<SearchHit>> {
    let secret = Arc::clone(secret);
    tokio::task::spawn_blocking(move || {
        let blobs: Vec<&str> = rows.iter().map(|(e, _)| e.encrypted_content.as_str()).collect();
        let plain = codec.decrypt_batch(&blobs, &secret);

        rows.iter()
            .zip(plain)
            .map(|((entry, similarity), result)| {
                let content = result.unwrap_or_else(|e| {
                    tracing::warn!(entry = %entry.id, error = %e, "failed to decrypt entry");
                    placeholder.to_string()
                });
                SearchHit {
                    entry: entry.clone(),
                    content,
                    similarity: *similarity,
                }
            })
            .collect()
    })
    .await
    .map_err(|e| HwError::Other(anyhow::anyhow!("decrypt task failed: {e}")))
}
