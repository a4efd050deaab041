//! hw-crypto: client-side encryption for hellowords journal entries
//!
//! Entry blob format (base64, standard alphabet):
//! ```text
//! [16 bytes: PBKDF2 salt][12 bytes: AES-GCM nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Key hierarchy:
//! ```text
//! UserSecret (deterministic, from account id + email; see KeySource)
//!   └── per-blob key: PBKDF2-HMAC-SHA256(secret, salt, >=100k rounds) -> 256-bit AES key
//! ```
//!
//! The per-blob key is re-derived on every encrypt and every decrypt and is
//! never cached.

pub mod codec;
pub mod hash;
pub mod kdf;

pub use codec::{decrypt, decrypt_batch, encrypt, Codec, DecryptionError};
pub use hash::content_hash;
pub use kdf::{
    derive_base_secret, stretch, AccountKeySource, KdfParams, KeySource, SymmetricKey,
    UserSecret,
};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the per-blob PBKDF2 salt
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
