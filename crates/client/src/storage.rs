//! Durable key/value storage for session and cart state.
//!
//! Storage is the only shared mutable resource of the client. Every write
//! stores a complete new value for its key; field-level updates are never
//! performed, so a crash can lose the latest write but never tear one.
//!
//! # Keys
//!
//! See [`storage_keys`]. The three session keys are cleared together on
//! logout; the cart and pending order keys are only cleared on checkout
//! completion or when the cart changes.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

/// Storage keys used by the client.
pub mod storage_keys {
    /// Current access token.
    pub const ACCESS_TOKEN: &str = "auth_token";
    /// Refresh token used to mint new access tokens.
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Cached customer profile (JSON).
    pub const PROFILE: &str = "user_profile";
    /// Cart line items (JSON array).
    pub const CART: &str = "cart";
    /// ID of the order created from the current cart, awaiting payment.
    pub const PENDING_ORDER: &str = "pending_order";
}

/// Errors that can occur while reading or writing durable storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    /// A value could not be serialized for storage.
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The storage lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// A durable string key/value store.
///
/// Implementations must make `set` replace the whole value atomically.
/// Calls are blocking and are made inline from async code, so they should
/// be fast local operations.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// FileStorage
// =============================================================================

/// File-backed storage: one file per key inside a directory.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so readers only ever observe a previous or the new complete value.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.tmp"));
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        fs::write(&tmp, value).map_err(io_err)?;
        fs::rename(&tmp, &target).map_err(io_err)?;
        debug!(key, bytes = value.len(), "storage write");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// Process-local storage, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("duka-storage-{name}-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("cart").unwrap(), None);

        storage.set("cart", "[]").unwrap();
        assert_eq!(storage.get("cart").unwrap().as_deref(), Some("[]"));

        storage.remove("cart").unwrap();
        storage.remove("cart").unwrap();
        assert_eq!(storage.get("cart").unwrap(), None);
    }

    #[test]
    fn test_file_storage_overwrites_whole_value() {
        let dir = temp_dir("overwrite");
        let storage = FileStorage::open(&dir).unwrap();

        storage.set(storage_keys::CART, "[1,2,3]").unwrap();
        storage.set(storage_keys::CART, "[]").unwrap();
        assert_eq!(storage.get(storage_keys::CART).unwrap().as_deref(), Some("[]"));

        // No temp file is left behind after a successful write
        assert!(!dir.join(".cart.tmp").exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = temp_dir("reopen");
        FileStorage::open(&dir)
            .unwrap()
            .set(storage_keys::ACCESS_TOKEN, "abc")
            .unwrap();

        let reopened = FileStorage::open(&dir).unwrap();
        assert_eq!(
            reopened.get(storage_keys::ACCESS_TOKEN).unwrap().as_deref(),
            Some("abc")
        );

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_storage_remove_missing_key() {
        let dir = temp_dir("remove");
        let storage = FileStorage::open(&dir).unwrap();
        storage.remove(storage_keys::PROFILE).unwrap();
        fs::remove_dir_all(dir).unwrap();
    }
}
