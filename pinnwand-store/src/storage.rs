//! The injected key-value storage capability.
//!
//! The hosting environment owns a process-wide, string-keyed blob store.
//! The feed core only ever talks to it through [`KeyValueStorage`], so it
//! can be exercised against an in-memory map in tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key {key:?} contains a path separator")]
    InvalidKey { key: String },
    #[error("Reading key {key:?} failed: {source}")]
    Read { key: String, source: io::Error },
    #[error("Writing key {key:?} failed: {source}")]
    Write { key: String, source: io::Error },
}

/// A change to the backing store made outside this process, pushed in by
/// the hosting environment. Carries only the changed key.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct StorageEvent {
    pub key: String,
}

pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Shared in-memory storage. Clones observe each other's writes, which is
/// how tests simulate a second writer on the same store.
#[derive(Clone, Debug)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// File-backed storage: one file per key under a root directory. Writes go
/// through a temporary file and a rename so readers never see a torn blob.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys become file names, so a key must not be able to climb out of
    /// the root directory.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.contains(['/', '\\']) {
            return Err(StorageError::InvalidKey {
                key: key.to_owned(),
            });
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_error = |source| StorageError::Write {
            key: key.to_owned(),
            source,
        };

        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(write_error)?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value).map_err(write_error)?;
        fs::rename(&staging, &path).map_err(write_error)?;

        Ok(())
    }
}
