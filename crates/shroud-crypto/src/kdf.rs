//! Key derivation: recovery phrase → encryption key (PBKDF2-HMAC-SHA256)

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::aead::EncryptionKey;
use crate::error::{CryptoError, CryptoResult};
use crate::phrase::RecoveryPhrase;
use crate::KEY_SIZE;

/// Application-wide derivation salt.
///
/// Fixed and identical for every user. Changing it orphans every key already
/// derived from a phrase.
pub const RECOVERY_SALT: &[u8] = b"shroud-recovery-v1";

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// PBKDF2 parameters for phrase derivation
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// HMAC-SHA256 rounds (default: 100 000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derive the encryption key for `phrase` with the default parameters.
///
/// Deterministic: the same phrase always yields the same key.
pub fn derive_key(phrase: &RecoveryPhrase) -> CryptoResult<EncryptionKey> {
    derive_key_with(phrase, &KdfParams::default())
}

/// Derive the encryption key for `phrase` with explicit parameters.
pub fn derive_key_with(phrase: &RecoveryPhrase, params: &KdfParams) -> CryptoResult<EncryptionKey> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyGenerationFailed(
            "PBKDF2 iteration count must be non-zero".to_string(),
        ));
    }

    let mut okm = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        phrase.expose().as_bytes(),
        RECOVERY_SALT,
        params.iterations,
        &mut okm,
    );
    tracing::debug!(iterations = params.iterations, "derived key from recovery phrase");

    let key = EncryptionKey::from_slice(&okm);
    okm.zeroize();
    key
}
