//! PostgREST-compatible entry store (e.g. a hosted Supabase project).
//!
//! Table rows live at `{url}/rest/v1/{table}`; the similarity search is the
//! stored procedure `{url}/rest/v1/rpc/{match_function}` taking
//! `(query_embedding, match_threshold, match_count, filter_user_id)`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use std::time::Duration;
use uuid::Uuid;

use hw_core::config::StoreConfig;
use hw_core::{Entry, HwError, HwResult, NewEntry};

use crate::{EntryStore, MatchQuery, MatchedEntry};

/// Connection settings for [`RestEntryStore`].
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub url: String,
    pub api_key: String,
    /// Signed-in user's access token; the API key is used when absent
    pub access_token: Option<String>,
    pub table: String,
    pub match_function: String,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn from_core_config(store: &StoreConfig, api_key: String) -> Self {
        Self {
            url: store.url.clone(),
            api_key,
            access_token: None,
            table: store.table.clone(),
            match_function: store.match_function.clone(),
            timeout: Duration::from_secs(store.timeout_secs),
        }
    }
}

pub struct RestEntryStore {
    client: reqwest::Client,
    cfg: RestConfig,
}

impl RestEntryStore {
    pub fn new(cfg: RestConfig) -> HwResult<Self> {
        if cfg.url.starts_with("http://") {
            tracing::warn!(
                url = %cfg.url,
                "entry store uses plaintext HTTP; ciphertext and API key are visible on the wire"
            );
        }
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| HwError::Config(format!("building HTTP client: {e}")))?;
        Ok(Self { client, cfg })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.cfg.url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let token = self.cfg.access_token.as_deref().unwrap_or(&self.cfg.api_key);
        self.client
            .request(method, self.endpoint(path))
            .header("apikey", &self.cfg.api_key)
            .bearer_auth(token)
    }

    fn owner_filter(user_id: &str) -> (&'static str, String) {
        ("user_id", format!("eq.{user_id}"))
    }
}

/// Turn a non-2xx response into an error carrying (truncated) body text.
async fn check(resp: Response, what: &str, on_err: fn(String) -> HwError) -> HwResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let body = &body[..floor_char_boundary(&body, 500)];
    Err(on_err(format!("{what} failed ({status}): {body}")))
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

fn write_err(e: reqwest::Error) -> HwError {
    HwError::RemoteWrite(e.to_string())
}

fn read_err(e: reqwest::Error) -> HwError {
    HwError::RemoteRead(e.to_string())
}

#[async_trait]
impl EntryStore for RestEntryStore {
    async fn insert(&self, entry: NewEntry) -> HwResult<Entry> {
        let resp = self
            .request(Method::POST, &self.cfg.table)
            .header("Prefer", "return=representation")
            .json(&entry)
            .send()
            .await
            .map_err(write_err)?;
        let rows: Vec<Entry> = check(resp, "insert", HwError::RemoteWrite)
            .await?
            .json()
            .await
            .map_err(write_err)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| HwError::RemoteWrite("insert returned no row".into()))
    }

    async fn update(&self, id: Uuid, entry: NewEntry) -> HwResult<Entry> {
        let mut body = serde_json::to_value(&entry)
            .map_err(|e| HwError::RemoteWrite(format!("serializing update: {e}")))?;
        body["updated_at"] = serde_json::json!(Utc::now());

        let resp = self
            .request(Method::PATCH, &self.cfg.table)
            .query(&[("id", format!("eq.{id}"))])
            .query(&[Self::owner_filter(&entry.user_id)])
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(write_err)?;
        let rows: Vec<Entry> = check(resp, "update", HwError::RemoteWrite)
            .await?
            .json()
            .await
            .map_err(write_err)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| HwError::RemoteWrite(format!("no entry {id} for this user")))
    }

    async fn list(&self, user_id: &str) -> HwResult<Vec<Entry>> {
        let resp = self
            .request(Method::GET, &self.cfg.table)
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .query(&[Self::owner_filter(user_id)])
            .send()
            .await
            .map_err(read_err)?;
        check(resp, "list", HwError::RemoteRead)
            .await?
            .json()
            .await
            .map_err(read_err)
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> HwResult<()> {
        let resp = self
            .request(Method::DELETE, &self.cfg.table)
            .query(&[("id", format!("eq.{id}"))])
            .query(&[Self::owner_filter(user_id)])
            .send()
            .await
            .map_err(write_err)?;
        check(resp, "delete", HwError::RemoteWrite).await?;
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> HwResult<u64> {
        let resp = self
            .request(Method::DELETE, &self.cfg.table)
            .query(&[Self::owner_filter(user_id)])
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(write_err)?;
        let rows: Vec<serde_json::Value> = check(resp, "delete all", HwError::RemoteWrite)
            .await?
            .json()
            .await
            .map_err(write_err)?;
        Ok(rows.len() as u64)
    }

    async fn match_entries(&self, query: &MatchQuery) -> HwResult<Vec<MatchedEntry>> {
        let resp = self
            .request(Method::POST, &format!("rpc/{}", self.cfg.match_function))
            .json(&serde_json::json!({
                "query_embedding": query.embedding,
                "match_threshold": query.threshold,
                "match_count": query.limit,
                "filter_user_id": query.user_id,
            }))
            .send()
            .await
            .map_err(read_err)?;
        check(resp, "match_entries", HwError::RemoteRead)
            .await?
            .json()
            .await
            .map_err(read_err)
    }
}
