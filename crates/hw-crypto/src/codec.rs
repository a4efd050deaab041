//! Entry text AES-256-GCM encryption/decryption
//!
//! Every blob carries its own random salt and nonce, so encrypting the same
//! text twice with the same secret yields unrelated blobs. Decryption
//! re-stretches the secret with the embedded salt.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use rayon::prelude::*;
use thiserror::Error;

use crate::kdf::{stretch, KdfParams, UserSecret};
use crate::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Smallest valid blob: salt + nonce + tag over an empty plaintext.
const MIN_BLOB_LEN: usize = SALT_SIZE + NONCE_SIZE + TAG_SIZE;

/// Why a blob could not be turned back into text.
///
/// Carries no plaintext: a failed decrypt yields only this signal.
#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error("blob is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("blob too short: {len} bytes (minimum {min})")]
    TooShort { len: usize, min: usize },

    #[error("authentication failed: wrong key or corrupted data")]
    Authentication,

    #[error("decrypted content is not UTF-8")]
    InvalidUtf8,
}

impl From<DecryptionError> for hw_core::HwError {
    fn from(e: DecryptionError) -> Self {
        hw_core::HwError::Decryption(e.to_string())
    }
}

/// Encryption codec bound to a set of KDF parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    params: KdfParams,
}

impl Codec {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Encrypt entry text. Returns `base64(salt ‖ nonce ‖ ciphertext+tag)`.
    pub fn encrypt(&self, plaintext: &str, secret: &UserSecret) -> anyhow::Result<String> {
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce_bytes);

        let key = stretch(secret, &salt, &self.params);
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("entry encryption failed: {e}"))?;

        let mut combined = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&salt);
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(combined))
    }

    /// Decrypt a blob produced by [`Codec::encrypt`].
    pub fn decrypt(&self, blob: &str, secret: &UserSecret) -> Result<String, DecryptionError> {
        let combined = STANDARD.decode(blob)?;
        if combined.len() < MIN_BLOB_LEN {
            return Err(DecryptionError::TooShort {
                len: combined.len(),
                min: MIN_BLOB_LEN,
            });
        }

        let (salt, rest) = combined.split_at(SALT_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

        let mut salt_arr = [0u8; SALT_SIZE];
        salt_arr.copy_from_slice(salt);
        let key = stretch(secret, &salt_arr, &self.params);
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| DecryptionError::Authentication)?;

        String::from_utf8(plaintext).map_err(|_| DecryptionError::InvalidUtf8)
    }

    /// Decrypt many blobs independently and in parallel.
    ///
    /// Output order matches input order; one bad blob never affects another.
    pub fn decrypt_batch<S>(
        &self,
        blobs: &[S],
        secret: &UserSecret,
    ) -> Vec<Result<String, DecryptionError>>
    where
        S: AsRef<str> + Sync,
    {
        blobs
            .par_iter()
            .map(|blob| self.decrypt(blob.as_ref(), secret))
            .collect()
    }
}

/// Encrypt with default KDF parameters.
pub fn encrypt(plaintext: &str, secret: &UserSecret) -> anyhow::Result<String> {
    Codec::default().encrypt(plaintext, secret)
}

/// Decrypt with default KDF parameters.
pub fn decrypt(blob: &str, secret: &UserSecret) -> Result<String, DecryptionError> {
    Codec::default().decrypt(blob, secret)
}

/// Batch-decrypt with default KDF parameters.
pub fn decrypt_batch<S>(blobs: &[S], secret: &UserSecret) -> Vec<Result<String, DecryptionError>>
where
    S: AsRef<str> + Sync,
{
    Codec::default().decrypt_batch(blobs, secret)
}
