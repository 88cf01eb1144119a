use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::KeyValueStore;

/// In-process store. Contents are lost when the value is dropped.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> KeyStoreResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| KeyStoreError::Backend("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, name: &str) -> KeyStoreResult<Option<String>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> KeyStoreResult<()> {
        self.lock()?.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> KeyStoreResult<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_remove_absent_is_ok() {
        MemoryStore::new().remove("never-set").unwrap();
    }
}
