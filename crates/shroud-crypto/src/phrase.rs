//! Recovery phrases: 12 words drawn from the BIP-39 English wordlist
//!
//! These are NOT BIP-39 mnemonics. Each word is an independent uniform draw
//! (with replacement) and there is no checksum word, so the same word may
//! appear twice. The phrase is only an alternate, human-copyable form of the
//! input to [`crate::kdf::derive_key`].

use std::str::FromStr;

use bip39::Language;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};

/// Number of words in a recovery phrase
pub const PHRASE_WORDS: usize = 12;

/// The fixed wordlist phrases are drawn from (2048 entries).
pub fn wordlist() -> &'static [&'static str; 2048] {
    Language::English.word_list()
}

/// A space-joined 12-word recovery phrase. Kept behind [`SecretString`].
pub struct RecoveryPhrase {
    inner: SecretString,
}

impl RecoveryPhrase {
    /// Draw a fresh phrase from the OS random source.
    pub fn generate() -> CryptoResult<Self> {
        let words = wordlist();

        let mut raw = [0u8; PHRASE_WORDS * 2];
        OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| CryptoError::KeyGenerationFailed(format!("OS random source: {e}")))?;

        // 2048 divides 2^16, so masking a u16 draw is unbiased
        let picked: Vec<&str> = raw
            .chunks_exact(2)
            .map(|pair| words[u16::from_le_bytes([pair[0], pair[1]]) as usize & (words.len() - 1)])
            .collect();
        raw.zeroize();

        Ok(Self {
            inner: SecretString::from(picked.join(" ")),
        })
    }

    /// The canonical phrase text: lowercase words joined by single spaces.
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.expose().split(' ')
    }
}

impl FromStr for RecoveryPhrase {
    type Err = CryptoError;

    /// Parse user input, normalizing case and whitespace. Words themselves are
    /// never echoed back in errors.
    fn from_str(input: &str) -> CryptoResult<Self> {
        let mut words: Vec<String> = input
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();

        if words.len() != PHRASE_WORDS {
            let count = words.len();
            words.zeroize();
            return Err(CryptoError::InvalidRecoveryPhrase(format!(
                "expected {PHRASE_WORDS} words, got {count}"
            )));
        }

        let list = wordlist();
        if let Some(position) = words.iter().position(|w| !list.contains(&w.as_str())) {
            words.zeroize();
            return Err(CryptoError::InvalidRecoveryPhrase(format!(
                "word {} is not in the wordlist",
                position + 1
            )));
        }

        let joined = words.join(" ");
        words.zeroize();
        Ok(Self {
            inner: SecretString::from(joined),
        })
    }
}

impl Clone for RecoveryPhrase {
    fn clone(&self) -> Self {
        Self {
            inner: SecretString::from(self.expose().to_string()),
        }
    }
}

impl std::fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryPhrase")
            .field("words", &"[REDACTED]")
            .finish()
    }
}
