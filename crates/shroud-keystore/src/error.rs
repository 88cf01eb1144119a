use thiserror::Error;

pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error(transparent)]
    Crypto(#[from] shroud_crypto::CryptoError),

    #[error("key store backend error: {0}")]
    Backend(String),

    #[error("key store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key store file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}
