//! Sled-backed implementation of the state store.

use crate::error::StorageError;
use crate::store::{StateStore, StoreKey};
use std::path::Path;

/// Durable state store on a sled database.
pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)
            .map_err(|e| StorageError::Backend(format!("Failed to open sled database: {}", e)))?;
        Ok(Self { db })
    }

    /// Default on-disk location under the platform data directory.
    pub fn default_path() -> Result<std::path::PathBuf, StorageError> {
        let dirs = directories::ProjectDirs::from("", "", "quill").ok_or_else(|| {
            StorageError::Backend("Could not determine platform data directory".to_string())
        })?;
        Ok(dirs.data_dir().join("state"))
    }
}

impl StateStore for SledStateStore {
    fn get_raw(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StorageError> {
        let value = self
            .db
            .get(key.as_str())
            .map_err(|e| StorageError::Backend(format!("Failed to read {}: {}", key.as_str(), e)))?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    fn put_raw(&self, key: StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.db
            .insert(key.as_str(), value)
            .map_err(|e| StorageError::Backend(format!("Failed to write {}: {}", key.as_str(), e)))?;
        self.db
            .flush()
            .map_err(|e| StorageError::Backend(format!("Failed to flush: {}", e)))?;
        Ok(())
    }

    fn remove_raw(&self, key: StoreKey) -> Result<(), StorageError> {
        self.db
            .remove(key.as_str())
            .map_err(|e| StorageError::Backend(format!("Failed to remove {}: {}", key.as_str(), e)))?;
        Ok(())
    }
}
