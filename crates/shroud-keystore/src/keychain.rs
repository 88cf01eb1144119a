//! Platform keychain backend.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS: Keychain Services
//! - Linux: kernel keyutils
//! - Windows: Credential Manager (DPAPI)
//!
//! Each slot is one keychain entry under the configured service name.

use zeroize::Zeroize;

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::KeyValueStore;

const CHECK_SLOT: &str = "__shroud_check__";

pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    /// Opens the keychain for `service` after writing, reading back and
    /// deleting a scratch entry.
    ///
    /// Fails when nothing persists between entries, which is the case when
    /// `keyring` only has its in-memory mock store for this platform.
    pub fn new(service: &str) -> KeyStoreResult<Self> {
        let store = Self {
            service: service.to_string(),
        };
        store.check_round_trip()?;
        Ok(store)
    }

    fn check_round_trip(&self) -> KeyStoreResult<()> {
        let token = format!("shroud-{}", std::process::id());
        self.set(CHECK_SLOT, &token)?;
        let read_back = self.get(CHECK_SLOT);
        self.remove(CHECK_SLOT)?;
        match read_back? {
            Some(value) if value == token => Ok(()),
            _ => Err(KeyStoreError::Backend(format!(
                "no persistent platform keychain for service '{}'",
                self.service
            ))),
        }
    }

    fn entry(&self, name: &str) -> KeyStoreResult<keyring::Entry> {
        keyring::Entry::new(&self.service, name)
            .map_err(|e| KeyStoreError::Backend(format!("keychain entry creation: {e}")))
    }
}

impl KeyValueStore for KeychainStore {
    fn get(&self, name: &str) -> KeyStoreResult<Option<String>> {
        match self.entry(name)?.get_password() {
            Ok(mut password) => {
                let value = password.clone();
                password.zeroize();
                Ok(Some(value))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeyStoreError::Backend(format!(
                "keychain get for '{name}': {e}"
            ))),
        }
    }

    fn set(&self, name: &str, value: &str) -> KeyStoreResult<()> {
        self.entry(name)?
            .set_password(value)
            .map_err(|e| KeyStoreError::Backend(format!("keychain store for '{name}': {e}")))?;
        tracing::debug!(slot = name, "stored secret in platform keychain");
        Ok(())
    }

    fn remove(&self, name: &str) -> KeyStoreResult<()> {
        match self.entry(name)?.delete_credential() {
            Ok(()) => {
                tracing::debug!(slot = name, "deleted secret from platform keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeyStoreError::Backend(format!(
                "keychain delete for '{name}': {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Either the host keychain keeps what we write, or opening it fails up
    // front. Losing a write silently is never acceptable.
    #[test]
    fn test_keychain_round_trips_or_refuses_to_open() {
        let store = match KeychainStore::new("shroud-keychain-test") {
            Ok(store) => store,
            Err(e) => {
                assert!(matches!(e, KeyStoreError::Backend(_)), "unexpected error: {e}");
                return;
            }
        };

        store.set("roundtrip", "c2VjcmV0").unwrap();
        assert_eq!(store.get("roundtrip").unwrap().as_deref(), Some("c2VjcmV0"));
        store.remove("roundtrip").unwrap();
        assert_eq!(store.get("roundtrip").unwrap(), None);
    }

    #[test]
    fn test_remove_missing_entry_is_ok() {
        if let Ok(store) = KeychainStore::new("shroud-keychain-test") {
            store.remove("never-written").unwrap();
        }
    }
}
