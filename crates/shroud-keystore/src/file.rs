//! File backend: every slot in one JSON object on disk.
//!
//! Writes go to a temp file in the same directory and are renamed into
//! place, so readers see either the old map or the new one. The temp file is
//! created owner-only (0600 on Unix) and keeps that mode after the rename.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::KeyValueStore;

pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> KeyStoreResult<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> KeyStoreResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, map)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> KeyStoreResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| KeyStoreError::Backend("file store lock poisoned".into()))?;

        let mut map = self.read_map()?;
        if mutate(&mut map) {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, name: &str) -> KeyStoreResult<Option<String>> {
        Ok(self.read_map()?.remove(name))
    }

    fn set(&self, name: &str, value: &str) -> KeyStoreResult<()> {
        self.update(|map| {
            map.insert(name.to_string(), value.to_string());
            true
        })?;
        tracing::debug!(slot = name, path = %self.path.display(), "wrote key store slot");
        Ok(())
    }

    fn remove(&self, name: &str) -> KeyStoreResult<()> {
        self.update(|map| map.remove(name).is_some())
    }
}
