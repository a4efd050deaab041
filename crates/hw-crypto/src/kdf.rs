//! Key derivation: account identity → base secret → per-blob AES key

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{KEY_SIZE, SALT_SIZE};

/// The per-account base secret that every entry key is stretched from.
///
/// Held only in process memory for the session. Never serialized.
pub struct UserSecret {
    inner: SecretString,
}

impl UserSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            inner: SecretString::from(secret.into()),
        }
    }

    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }
}

impl std::fmt::Debug for UserSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSecret")
            .field("inner", &"[REDACTED]")
            .finish()
    }
}

/// Source of the base secret for an authenticated account.
///
/// The codec only ever sees a `UserSecret`, so a server-held or user-chosen
/// secret can replace `AccountKeySource` without touching encryption.
pub trait KeySource: Send + Sync {
    fn derive(&self, account_id: &str, email: &str) -> UserSecret;
}

/// Deterministic secret from account id + email.
///
/// Anyone who knows both values can derive the same secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountKeySource;

impl KeySource for AccountKeySource {
    fn derive(&self, account_id: &str, email: &str) -> UserSecret {
        derive_base_secret(account_id, email)
    }
}

/// Derive the base secret for an account. Pure: same inputs, same secret.
pub fn derive_base_secret(account_id: &str, email: &str) -> UserSecret {
    UserSecret::new(format!("{account_id}:{email}:journal_encryption_key"))
}

/// A 256-bit AES key stretched for a single blob. Zeroized on drop.
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// HMAC-SHA256 rounds (default: 100000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: 100_000,
        }
    }
}

/// Stretch a base secret with a blob's salt into a 256-bit AES key.
pub fn stretch(secret: &UserSecret, salt: &[u8; SALT_SIZE], params: &KdfParams) -> SymmetricKey {
    let mut bytes = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        secret.expose().as_bytes(),
        salt,
        params.iterations,
        &mut bytes,
    );
    SymmetricKey { bytes }
}
