//! shroud-keystore: get-or-create key management over pluggable persistence
//!
//! Two slots, both string-valued:
//!   - `encryption_key`: the current key, base64
//!   - `seed_phrase`:    the recovery phrase the key was derived from, if any
//!
//! The slots are lifecycle-linked: a stored phrase always derives the stored
//! key. Clearing or replacing the key drops the phrase.
//!
//! Backends:
//!   - [`FileStore`]     JSON map on disk (default)
//!   - [`KeychainStore`] platform keychain via `keyring`
//!   - [`MemoryStore`]   process memory, for tests and ephemeral sessions

pub mod error;
pub mod file;
pub mod keychain;
pub mod memory;

pub use error::{KeyStoreError, KeyStoreResult};
pub use file::FileStore;
pub use keychain::KeychainStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use shroud_core::config::{KeyStoreBackend, KeyStoreConfig};
use shroud_crypto::{
    derive_key_with, ensure_supported, generate_key, EncryptionKey, KdfParams, RecoveryPhrase,
};

/// Well-known slot names
pub mod slots {
    /// The current encryption key (base64)
    pub const ENCRYPTION_KEY: &str = "encryption_key";
    /// The recovery phrase paired with the current key
    pub const SEED_PHRASE: &str = "seed_phrase";
}

/// String-keyed, string-valued persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, name: &str) -> KeyStoreResult<Option<String>>;
    fn set(&self, name: &str, value: &str) -> KeyStoreResult<()>;
    /// Removing an absent entry is not an error.
    fn remove(&self, name: &str) -> KeyStoreResult<()>;
}

/// Build the backend selected in config.
pub fn open_store(config: &KeyStoreConfig) -> KeyStoreResult<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        KeyStoreBackend::File => Arc::new(FileStore::new(config.resolved_path())),
        KeyStoreBackend::Keychain => Arc::new(KeychainStore::new(&config.service)?),
        KeyStoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::debug!(backend = ?config.backend, "opened key store");
    Ok(store)
}

/// Owner of the current-key and recovery-phrase slots.
///
/// Nothing is cached: every call reads the backend, so concurrent users of
/// one backend converge on whatever was persisted last.
#[derive(Clone)]
pub struct KeyStore {
    backend: Arc<dyn KeyValueStore>,
    kdf: KdfParams,
}

impl KeyStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            kdf: KdfParams::default(),
        }
    }

    /// Override the PBKDF2 parameters used by the phrase operations.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Return the persisted key, generating and persisting one if the slot is
    /// empty. Never overwrites an existing key.
    pub fn get_or_create_key(&self) -> KeyStoreResult<String> {
        if let Some(existing) = self.backend.get(slots::ENCRYPTION_KEY)? {
            return Ok(existing);
        }

        ensure_supported()?;
        let key = generate_key()?;
        self.backend.set(slots::ENCRYPTION_KEY, &key.to_base64())?;
        tracing::info!("generated new encryption key");

        // Re-read: if another creator raced us, the last write wins
        self.backend
            .get(slots::ENCRYPTION_KEY)?
            .ok_or_else(|| KeyStoreError::Backend("key slot empty right after write".into()))
    }

    /// The current key, imported and ready for use.
    pub fn current_key(&self) -> KeyStoreResult<EncryptionKey> {
        let encoded = self.get_or_create_key()?;
        Ok(EncryptionKey::from_base64(&encoded)?)
    }

    /// Replace the current key. The value must import as a valid key.
    ///
    /// Any stored recovery phrase belonged to the old key and is removed.
    pub fn save_key(&self, encoded: &str) -> KeyStoreResult<()> {
        let key = EncryptionKey::from_base64(encoded)?;
        self.backend.remove(slots::SEED_PHRASE)?;
        self.backend.set(slots::ENCRYPTION_KEY, &key.to_base64())
    }

    /// Delete the current key and its paired recovery phrase.
    pub fn clear_key(&self) -> KeyStoreResult<()> {
        self.backend.remove(slots::ENCRYPTION_KEY)?;
        self.backend.remove(slots::SEED_PHRASE)?;
        tracing::info!("cleared encryption key and recovery phrase");
        Ok(())
    }

    pub fn save_seed_phrase(&self, phrase: &RecoveryPhrase) -> KeyStoreResult<()> {
        self.backend.set(slots::SEED_PHRASE, phrase.expose())
    }

    pub fn get_seed_phrase(&self) -> KeyStoreResult<Option<RecoveryPhrase>> {
        match self.backend.get(slots::SEED_PHRASE)? {
            Some(stored) => Ok(Some(stored.parse()?)),
            None => Ok(None),
        }
    }

    pub fn has_key(&self) -> KeyStoreResult<bool> {
        Ok(self.backend.get(slots::ENCRYPTION_KEY)?.is_some())
    }

    /// Start a new identity from a fresh recovery phrase: derive its key and
    /// persist both. Replaces any existing key.
    pub fn initialize_with_phrase(&self) -> KeyStoreResult<RecoveryPhrase> {
        ensure_supported()?;
        let phrase = RecoveryPhrase::generate()?;
        self.restore_from_phrase(&phrase)?;
        Ok(phrase)
    }

    /// Re-derive the key for `phrase` and make it current, storing the phrase
    /// alongside it.
    ///
    /// If the phrase cannot be stored the new key is still current but no
    /// phrase is left behind.
    pub fn restore_from_phrase(&self, phrase: &RecoveryPhrase) -> KeyStoreResult<EncryptionKey> {
        let key = derive_key_with(phrase, &self.kdf)?;
        self.backend.remove(slots::SEED_PHRASE)?;
        self.backend.set(slots::ENCRYPTION_KEY, &key.to_base64())?;
        if let Err(e) = self.save_seed_phrase(phrase) {
            tracing::warn!(error = %e, "key restored but recovery phrase was not stored");
            return Err(e);
        }
        tracing::info!("restored encryption key from recovery phrase");
        Ok(key)
    }
}
