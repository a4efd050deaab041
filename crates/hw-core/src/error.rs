use thiserror::Error;

pub type HwResult<T> = Result<T, HwError>;

#[derive(Debug, Error)]
pub enum HwError {
    /// Malformed or tampered ciphertext. Surfaced per item, never aborts a batch.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// Embedding provider failure. Degrades to an absent embedding.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Insert/update/delete against the remote store failed.
    #[error("remote write error: {0}")]
    RemoteWrite(String),

    #[error("remote read error: {0}")]
    RemoteRead(String),

    /// Sign-in / sign-out failure. Logged, non-fatal to composition.
    #[error("auth error: {0}")]
    Auth(String),

    #[error("local storage error: {0}")]
    Local(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
