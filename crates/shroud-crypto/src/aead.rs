//! AES-256-GCM primitives: key generation, key import/export, envelope seal/open

use std::sync::OnceLock;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{IV_SIZE, KEY_SIZE, TAG_SIZE};

/// A 256-bit AES-GCM key. Zeroized on drop.
///
/// Keys are exportable on purpose: the key store persists them in base64 so a
/// client identity survives restarts and can be backed up.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Import raw key material. Anything other than exactly 32 bytes is rejected.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "expected {KEY_SIZE} bytes of key material, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        let imported = Self::from_bytes(key);
        key.zeroize();
        Ok(imported)
    }

    /// Import a key from its base64 export form.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let mut raw = decode_base64(encoded.trim())
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("key is not valid base64: {e}")))?;
        let imported = Self::from_slice(&raw);
        raw.zeroize();
        imported
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Export the key material as standard base64.
    pub fn to_base64(&self) -> String {
        encode_base64(&self.bytes)
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// One encrypted message: `[12-byte IV][ciphertext][16-byte tag]`.
///
/// Produced only by [`encrypt`] (fresh IV every call) or parsed from its
/// base64 transport form; never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    bytes: Vec<u8>,
}

impl Envelope {
    /// Wrap raw envelope bytes. Buffers too short to hold an IV and a tag
    /// cannot authenticate and are rejected as undecryptable.
    pub fn from_bytes(bytes: Vec<u8>) -> CryptoResult<Self> {
        if bytes.len() < IV_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        Ok(Self { bytes })
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = decode_base64(encoded.trim()).map_err(|_| CryptoError::DecryptionFailed)?;
        Self::from_bytes(bytes)
    }

    pub fn iv(&self) -> &[u8] {
        &self.bytes[..IV_SIZE]
    }

    /// Ciphertext with the GCM tag appended.
    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[IV_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        encode_base64(&self.bytes)
    }
}

impl AsRef<[u8]> for Envelope {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").field("len", &self.bytes.len()).finish()
    }
}

/// Generate a random 256-bit key from the OS random source.
pub fn generate_key() -> CryptoResult<EncryptionKey> {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::KeyGenerationFailed(format!("OS random source: {e}")))?;
    let key = EncryptionKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Encrypt `plaintext` under `key` with a fresh random IV and no AAD.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> CryptoResult<Envelope> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut iv = [0u8; IV_SIZE];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::EncryptionFailed(format!("IV generation: {e}")))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("AES-256-GCM: {e}")))?;

    let mut bytes = Vec::with_capacity(IV_SIZE + ciphertext.len());
    bytes.extend_from_slice(&iv);
    bytes.extend_from_slice(&ciphertext);
    Ok(Envelope { bytes })
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// Input: `[12-byte IV][ciphertext][16-byte tag]`
pub fn decrypt(envelope: &[u8], key: &EncryptionKey) -> CryptoResult<Vec<u8>> {
    if envelope.len() < IV_SIZE {
        tracing::debug!(len = envelope.len(), "envelope shorter than IV");
        return Err(CryptoError::DecryptionFailed);
    }

    let (iv, ciphertext) = envelope.split_at(IV_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded)
}

static PROBE: OnceLock<CryptoResult<()>> = OnceLock::new();

/// Capability probe: the OS random source must be reachable and an
/// AES-256-GCM seal/open must round-trip. Runs once per process.
pub fn ensure_supported() -> CryptoResult<()> {
    PROBE.get_or_init(run_probe).clone()
}

fn run_probe() -> CryptoResult<()> {
    let key = generate_key()
        .map_err(|e| CryptoError::UnsupportedEnvironment(format!("random source: {e}")))?;

    let sealed = encrypt(b"shroud-probe", &key)
        .map_err(|e| CryptoError::UnsupportedEnvironment(format!("AES-256-GCM self-test: {e}")))?;

    match decrypt(sealed.as_bytes(), &key) {
        Ok(opened) if opened == b"shroud-probe" => Ok(()),
        _ => Err(CryptoError::UnsupportedEnvironment(
            "AES-256-GCM self-test did not round-trip".to_string(),
        )),
    }
}
