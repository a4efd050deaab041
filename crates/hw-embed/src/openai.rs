//! OpenAI-compatible `/v1/embeddings` provider.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use hw_core::config::EmbeddingConfig;
use hw_core::{HwError, HwResult};

use crate::Embedder;

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> HwResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HwError::Config(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(cfg: &EmbeddingConfig, api_key: String) -> HwResult<Self> {
        Self::new(
            cfg.base_url.clone(),
            cfg.model.clone(),
            api_key,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }
}

fn parse_embedding(body: EmbeddingResponse) -> HwResult<Vec<f32>> {
    body.data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HwError::Embedding("provider returned no embedding".into()))
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> HwResult<Vec<f32>> {
        let resp = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": &self.model, "input": text }))
            .send()
            .await
            .map_err(|e| HwError::Embedding(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let parsed: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
            let message = parsed["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.chars().take(500).collect());
            return Err(HwError::Embedding(format!("{} ({status}): {message}", self.model)));
        }

        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| HwError::Embedding(format!("bad response: {e}")))?;
        parse_embedding(body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
