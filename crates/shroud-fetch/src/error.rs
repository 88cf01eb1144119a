//! Interception layer error types.

use thiserror::Error;

/// Result type for intercepted calls.
pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Crypto(#[from] shroud_crypto::CryptoError),

    #[error(transparent)]
    KeyStore(#[from] shroud_keystore::KeyStoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("response body: {0}")]
    Body(String),
}
