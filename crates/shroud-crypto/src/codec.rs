//! Envelope codec: text and JSON payloads, and the transport form
//!
//! Transport form (bit-exact, shared with the server):
//! ```text
//! {"encrypted": true, "data": "<base64 of IV || ciphertext || tag>"}
//! ```
//!
//! Any JSON document not of that shape is plaintext.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::aead::{decode_base64, decrypt, encrypt, EncryptionKey, Envelope};
use crate::error::{CryptoError, CryptoResult};

/// Encrypt UTF-8 text. Returns the base64 envelope.
pub fn encrypt_text(plaintext: &str, key: &EncryptionKey) -> CryptoResult<String> {
    Ok(encrypt(plaintext.as_bytes(), key)?.to_base64())
}

/// Decrypt a base64 envelope back to UTF-8 text.
pub fn decrypt_text(encoded: &str, key: &EncryptionKey) -> CryptoResult<String> {
    let envelope = Envelope::from_base64(encoded)?;
    let plaintext = decrypt(envelope.as_bytes(), key)?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::MalformedPayload("decrypted payload is not UTF-8".to_string()))
}

/// Serialize `value` as JSON, then encrypt it as text.
pub fn encrypt_json<T: Serialize + ?Sized>(value: &T, key: &EncryptionKey) -> CryptoResult<String> {
    let text = serde_json::to_string(value)
        .map_err(|e| CryptoError::EncryptionFailed(format!("JSON serialization: {e}")))?;
    encrypt_text(&text, key)
}

/// Decrypt a base64 envelope and parse the plaintext as JSON.
pub fn decrypt_json<T: DeserializeOwned>(encoded: &str, key: &EncryptionKey) -> CryptoResult<T> {
    let text = decrypt_text(encoded, key)?;
    serde_json::from_str(&text).map_err(|e| {
        CryptoError::MalformedPayload(format!("decrypted payload is not valid JSON: {e}"))
    })
}

/// The transport form of one encrypted body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    pub encrypted: bool,
    /// Base64 envelope
    pub data: String,
}

impl EncryptedMessage {
    pub fn new(data: String) -> Self {
        Self {
            encrypted: true,
            data,
        }
    }

    /// Render as the JSON wire body.
    pub fn to_json(&self) -> CryptoResult<String> {
        serde_json::to_string(self)
            .map_err(|e| CryptoError::EncryptionFailed(format!("envelope serialization: {e}")))
    }
}

/// Result of checking a JSON document against the transport form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// `{"encrypted": true, "data": "<base64>"}`; holds the `data` string
    Encrypted(&'a str),
    /// Anything else
    Plain,
}

/// Classify a parsed body before any decryption is attempted.
///
/// `encrypted` must be the boolean `true` and `data` must be present. A
/// document that claims encryption but whose `data` is not a string is
/// rejected rather than treated as plaintext.
pub fn classify(value: &Value) -> CryptoResult<Payload<'_>> {
    let Some(object) = value.as_object() else {
        return Ok(Payload::Plain);
    };

    if object.get("encrypted") != Some(&Value::Bool(true)) {
        return Ok(Payload::Plain);
    }

    match object.get("data") {
        None => Ok(Payload::Plain),
        Some(Value::String(data)) => Ok(Payload::Encrypted(data)),
        Some(_) => Err(CryptoError::MalformedPayload(
            "encrypted body has a non-string `data` field".to_string(),
        )),
    }
}

/// True when `value` looks like the transport form (`encrypted: true` and a
/// `data` key), regardless of the type of `data`.
pub fn is_encrypted(value: &Value) -> bool {
    value.get("encrypted") == Some(&Value::Bool(true)) && value.get("data").is_some()
}

/// The envelope string of a transport-form document, without decrypting it.
pub fn extract_encrypted_data(value: &Value) -> Option<&str> {
    match classify(value) {
        Ok(Payload::Encrypted(data)) => Some(data),
        _ => None,
    }
}

/// Wrap an already-encrypted envelope string in the transport form.
pub fn wrap_encrypted(data: impl Into<String>) -> Value {
    let data: String = data.into();
    serde_json::json!({
        "encrypted": true,
        "data": data,
    })
}

/// Check that `data` is well-formed standard base64. Does not decrypt.
pub fn validate_encrypted_format(data: &str) -> bool {
    decode_base64(data).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::generate_key;
    use crate::{IV_SIZE, TAG_SIZE};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_text_roundtrip() {
        let key = generate_key().unwrap();
        for text in ["", "rent", "embedded\0nul", "ünïcödé ✓"] {
            let sealed = encrypt_text(text, &key).unwrap();
            assert_eq!(decrypt_text(&sealed, &key).unwrap(), text);
        }
    }

    #[test]
    fn test_text_envelope_layout() {
        let key = generate_key().unwrap();
        let sealed = encrypt_text("hello", &key).unwrap();
        let raw = decode_base64(&sealed).unwrap();
        assert_eq!(raw.len(), IV_SIZE + "hello".len() + TAG_SIZE);
    }

    #[test]
    fn test_json_roundtrip() {
        let key = generate_key().unwrap();
        let body = json!({"amount": 100, "note": "rent"});

        let sealed = encrypt_json(&body, &key).unwrap();
        let opened: Value = decrypt_json(&sealed, &key).unwrap();

        assert_eq!(opened, body);
    }

    #[test]
    fn test_decrypt_json_rejects_non_json() {
        let key = generate_key().unwrap();
        let sealed = encrypt_text("definitely { not json", &key).unwrap();

        let result: CryptoResult<Value> = decrypt_json(&sealed, &key);
        assert!(matches!(result, Err(CryptoError::MalformedPayload(_))));
    }

    #[test]
    fn test_decrypt_text_rejects_garbage() {
        let key = generate_key().unwrap();
        assert!(matches!(
            decrypt_text("%%%not-base64%%%", &key),
            Err(CryptoError::DecryptionFailed)
        ));
        assert!(matches!(
            decrypt_text("", &key),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_decrypt_text_wrong_key() {
        let sealed = encrypt_text("secret", &generate_key().unwrap()).unwrap();
        let result = decrypt_text(&sealed, &generate_key().unwrap());
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_transport_form_wire_shape() {
        let message = EncryptedMessage::new("QUJD".to_string());
        assert_eq!(
            message.to_json().unwrap(),
            r#"{"encrypted":true,"data":"QUJD"}"#
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&json!({"encrypted": true, "data": "QUJD"})).unwrap(),
            Payload::Encrypted("QUJD")
        );
        assert_eq!(classify(&json!({"balance": 42})).unwrap(), Payload::Plain);
        assert_eq!(
            classify(&json!({"encrypted": false, "data": "QUJD"})).unwrap(),
            Payload::Plain
        );
        assert_eq!(
            classify(&json!({"encrypted": "true", "data": "QUJD"})).unwrap(),
            Payload::Plain
        );
        assert_eq!(classify(&json!({"encrypted": true})).unwrap(), Payload::Plain);
        assert_eq!(classify(&json!([1, 2, 3])).unwrap(), Payload::Plain);
        assert!(matches!(
            classify(&json!({"encrypted": true, "data": 7})),
            Err(CryptoError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_server_side_helpers() {
        let wrapped = wrap_encrypted("QUJD");
        assert!(is_encrypted(&wrapped));
        assert_eq!(extract_encrypted_data(&wrapped), Some("QUJD"));

        let plain = json!({"note": "rent"});
        assert!(!is_encrypted(&plain));
        assert_eq!(extract_encrypted_data(&plain), None);

        let odd = json!({"encrypted": true, "data": 7});
        assert!(is_encrypted(&odd));
        assert_eq!(extract_encrypted_data(&odd), None);
    }

    #[test]
    fn test_validate_encrypted_format() {
        let key = generate_key().unwrap();
        let sealed = encrypt_text("payload", &key).unwrap();

        assert!(validate_encrypted_format(&sealed));
        assert!(!validate_encrypted_format("not base64!"));
    }

    proptest! {
        #[test]
        fn text_roundtrip_any_string(text in any::<String>()) {
            let key = EncryptionKey::from_bytes([9u8; crate::KEY_SIZE]);
            let sealed = encrypt_text(&text, &key).unwrap();
            prop_assert_eq!(decrypt_text(&sealed, &key).unwrap(), text);
        }
    }
}
