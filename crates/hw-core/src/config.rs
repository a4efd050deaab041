use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HwError, HwResult};

/// Lower bound on PBKDF2 rounds accepted from a config file.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Top-level client configuration (loaded from hellowords.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HwConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub crypto: CryptoConfig,
    pub search: SearchConfig,
    pub local: LocalConfig,
    pub location: LocationConfig,
    pub log: LogConfig,
}

/// Which remote entry store to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store, lost on exit (development and tests)
    Memory,
    /// PostgREST-compatible HTTP endpoint
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Base URL of the REST endpoint (e.g. https://xyz.supabase.co)
    pub url: String,
    /// Environment variable holding the anon/API key
    pub api_key_env: String,
    /// Environment variable holding the signed-in user's access token.
    /// Unset in the environment means requests authenticate with the API key.
    pub access_token_env: String,
    /// Table holding entries
    pub table: String,
    /// Server-side similarity procedure
    pub match_function: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Disable to store entries without a semantic index
    pub enabled: bool,
    /// OpenAI-compatible API base (without /v1)
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the provider API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

/// Client-side encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 rounds per encrypt/decrypt (default: 100000)
    pub pbkdf2_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum cosine similarity (default: 0.7)
    pub threshold: f32,
    /// Maximum number of hits (default: 5)
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// JSON file backing the local slots (pending entry, draft, preferences)
    pub slots_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fixed location label reported when location saving is enabled.
    /// Unset means the locator always answers "Location unavailable".
    pub label: Option<String>,
    /// Upper bound on a location lookup (default: 5s)
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: "http://localhost:54321".into(),
            api_key_env: "HW_STORE_API_KEY".into(),
            access_token_env: "HW_ACCESS_TOKEN".into(),
            table: "entries".into(),
            match_function: "match_entries".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com".into(),
            model: "text-embedding-3-small".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            limit: 5,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            slots_path: PathBuf::from("~/.local/share/hellowords/slots.json"),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            label: None,
            timeout_secs: 5,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl HwConfig {
    /// Parse a config from TOML text and validate it.
    pub fn from_toml(text: &str) -> HwResult<Self> {
        let config: HwConfig =
            toml::from_str(text).map_err(|e| HwError::Config(format!("parsing config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> HwResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> HwResult<()> {
        if self.crypto.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(HwError::Config(format!(
                "crypto.pbkdf2_iterations = {} is below the minimum of {}",
                self.crypto.pbkdf2_iterations, MIN_PBKDF2_ITERATIONS
            )));
        }
        if !(-1.0..=1.0).contains(&self.search.threshold) {
            return Err(HwError::Config(format!(
                "search.threshold = {} must be a cosine similarity in [-1, 1]",
                self.search.threshold
            )));
        }
        if self.search.limit == 0 {
            return Err(HwError::Config("search.limit must be at least 1".into()));
        }
        if self.store.backend == StoreBackend::Rest && self.store.url.is_empty() {
            return Err(HwError::Config(
                "store.url is required for the rest backend".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{home}/{rest}"))
    } else {
        path.to_path_buf()
    }
}
