use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::content::atomic_io::write_bytes_atomic;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key/value byte store the save slot lives in. Keys are relative,
/// `/`-separated names such as `henhouse.save.json`.
pub trait StorageBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
    fn delete(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        write_bytes_atomic(&path, bytes).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), byte_count = bytes.len(), "storage_write");
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Delete { path, source }),
        }
    }
}

/// In-process store. Clones share the same entries, so a test can keep a
/// handle and inspect what a session wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `write` fail until switched back off.
    pub fn set_fail_writes(&self, fail: bool) {
        match self.fail_writes.lock() {
            Ok(mut guard) => *guard = fail,
            Err(poisoned) => *poisoned.into_inner() = fail,
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), bytes.to_vec());
        });
    }

    fn writes_fail(&self) -> bool {
        match self.fail_writes.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> R) -> R {
        match self.entries.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get(key))
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.writes_fail() {
            return Err(StorageError::Unavailable(format!(
                "write to '{key}' rejected"
            )));
        }
        self.insert(key, bytes);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.remove(key);
        });
        Ok(())
    }
}
