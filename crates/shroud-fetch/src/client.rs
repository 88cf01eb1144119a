//! Transparent encryption around a [`Transport`].
//!
//! Per call:
//! ```text
//! Idle → KeyResolved → {RequestEncrypted | RequestPassthrough} → Dispatched
//!      → {ResponseDecrypted | ResponsePassthrough | Failed}
//! ```
//! Nothing is retried here.

use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use serde::de::IgnoredAny;
use serde_json::Value;
use shroud_crypto::{
    classify, decrypt_text, encrypt_text, ensure_supported, CryptoError, EncryptedMessage,
    EncryptionKey, Payload,
};
use shroud_keystore::KeyStore;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::request::RequestOptions;
use crate::response::Response;
use crate::transport::Transport;

/// Wraps a transport so request bodies leave encrypted and enveloped
/// responses come back decrypted.
pub struct EncryptedClient<T> {
    transport: T,
    keys: KeyStore,
    enabled: AtomicBool,
}

impl<T: Transport> EncryptedClient<T> {
    /// Fails with `UnsupportedEnvironment` when the crypto primitives are
    /// unusable on this host. Encryption starts enabled.
    pub fn new(transport: T, keys: KeyStore) -> FetchResult<Self> {
        ensure_supported()?;
        Ok(Self {
            transport,
            keys,
            enabled: AtomicBool::new(true),
        })
    }

    pub fn with_encryption(self, enabled: bool) -> Self {
        self.set_encryption_enabled(enabled);
        self
    }

    pub fn set_encryption_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        debug!(enabled, "encryption toggled");
    }

    pub fn encryption_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Issue one call through the transport.
    ///
    /// With encryption enabled, any body is replaced by its transport form and
    /// a response in transport form is decrypted before it is returned. A
    /// response that cannot be decrypted is an error, never a ciphertext
    /// body.
    pub async fn call(&self, target: &str, options: RequestOptions) -> FetchResult<Response> {
        if !self.encryption_enabled() {
            debug!(stage = "request_passthrough", target, "encryption disabled");
            return self.transport.send(target, options).await;
        }

        // Re-read every call so a key replaced elsewhere takes effect at once
        let key = self.keys.current_key().inspect_err(|e| {
            warn!(stage = "key_resolved", target, error = %e, "could not resolve key");
        })?;
        debug!(stage = "key_resolved", target);

        let options = seal_request(options, &key).inspect_err(|e| {
            warn!(stage = "request_encrypted", target, error = %e, "request encryption failed");
        })?;

        let response = self.transport.send(target, options).await.inspect_err(|e| {
            warn!(stage = "dispatched", target, error = %e, "transport failed");
        })?;
        debug!(stage = "dispatched", target, status = %response.status());

        open_response(response, &key).inspect_err(|e| {
            warn!(stage = "response_decrypted", target, error = %e, "response decryption failed");
        })
    }
}

/// Replace the body with its transport form. The caller's text is sealed
/// byte for byte, so JSON keeps its key order and number formatting.
fn seal_request(mut options: RequestOptions, key: &EncryptionKey) -> FetchResult<RequestOptions> {
    let Some(body) = options.body.take() else {
        debug!(stage = "request_passthrough", "no body");
        return Ok(options);
    };

    let kind = match serde_json::from_str::<IgnoredAny>(&body) {
        Ok(_) => "json",
        Err(_) => "text",
    };
    let data = encrypt_text(&body, key)?;

    options.body = Some(EncryptedMessage::new(data).to_json()?);
    options
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    options.headers.remove(CONTENT_LENGTH);
    debug!(stage = "request_encrypted", kind);
    Ok(options)
}

/// Decrypt a transport-form response. Everything else is returned untouched.
fn open_response(response: Response, key: &EncryptionKey) -> FetchResult<Response> {
    if !response.is_json() {
        debug!(stage = "response_passthrough", "not JSON");
        return Ok(response);
    }

    let Ok(value) = serde_json::from_slice::<Value>(response.bytes()) else {
        debug!(stage = "response_passthrough", "JSON content type but unparseable body");
        return Ok(response);
    };

    let data = match classify(&value)? {
        Payload::Encrypted(data) => data,
        Payload::Plain => {
            debug!(stage = "response_passthrough", "plain JSON");
            return Ok(response);
        }
    };

    let plaintext = decrypt_text(data, key)?;
    serde_json::from_str::<IgnoredAny>(&plaintext).map_err(|e| {
        CryptoError::MalformedPayload(format!("decrypted payload is not valid JSON: {e}"))
    })?;
    let body = plaintext.into_bytes();

    let mut headers = response.headers().clone();
    headers.remove(CONTENT_LENGTH);
    debug!(stage = "response_decrypted", bytes = body.len());
    Ok(response.with_body(headers, body))
}
