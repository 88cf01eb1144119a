use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong key and tampered ciphertext are deliberately indistinguishable.
    #[error("decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("invalid recovery phrase: {0}")]
    InvalidRecoveryPhrase(String),
}
