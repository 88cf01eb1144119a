//! shroud-crypto: client-side payload encryption for shroud
//!
//! Envelope format (binary, base64-encoded for transport):
//! ```text
//! [12 bytes: random IV][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Key sources:
//! ```text
//! EncryptionKey (256-bit AES-GCM key)
//!   ├── random:  generate_key()
//!   └── derived: RecoveryPhrase (12 words) → PBKDF2-HMAC-SHA256 (100k rounds, fixed salt)
//! ```
//!
//! Transport form of an encrypted body: `{"encrypted": true, "data": "<base64 envelope>"}`

pub mod aead;
pub mod codec;
pub mod error;
pub mod kdf;
pub mod phrase;

pub use aead::{
    decode_base64, decrypt, encode_base64, encrypt, ensure_supported, generate_key, EncryptionKey,
    Envelope,
};
pub use codec::{
    classify, decrypt_json, decrypt_text, encrypt_json, encrypt_text, extract_encrypted_data,
    is_encrypted, validate_encrypted_format, wrap_encrypted, EncryptedMessage, Payload,
};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, derive_key_with, KdfParams};
pub use phrase::RecoveryPhrase;

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
