//! Durable key-value storage.
//!
//! The variable store and the identifier ledger keep their state in a
//! [`Storage`] backend. [`JsonFileStorage`] persists every key into a single
//! JSON file and rewrites it on each mutation; [`MemoryStorage`] keeps
//! everything in process and is used by tests and one-shot runs.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Result, WeaveError};

/// Durable storage collaborator.
///
/// Implementations must make each call atomic on its own; callers that need
/// read-modify-write atomicity across calls hold their own lock.
pub trait Storage: Send + Sync {
    /// Read one key. `Ok(None)` when absent.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write one key, persisting immediately.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Snapshot of every stored key, in insertion order.
    fn get_all(&self) -> Result<IndexMap<String, Value>>;

    /// Remove one key. Returns `true` if it existed.
    fn remove(&self, key: &str) -> Result<bool>;
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> WeaveError {
    WeaveError::Storage(format!("Failed to acquire storage lock: {}", e))
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<IndexMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.lock().map_err(lock_err)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock().map_err(lock_err)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn get_all(&self) -> Result<IndexMap<String, Value>> {
        let entries = self.entries.lock().map_err(lock_err)?;
        Ok(entries.clone())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(lock_err)?;
        Ok(entries.shift_remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// JSON file backend
// ---------------------------------------------------------------------------

/// Storage persisted as one pretty-printed JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStorage {
    entries: Mutex<IndexMap<String, Value>>,
    storage_path: PathBuf,
}

impl JsonFileStorage {
    /// Open (or lazily create) storage at `path`. Existing contents are
    /// loaded eagerly; the file itself is only written on the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = Self::load(&path)?;
        Ok(Self {
            entries: Mutex::new(entries),
            storage_path: path,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    fn save(&self, entries: &IndexMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.storage_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WeaveError::Storage(format!(
                    "Failed to create storage directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| WeaveError::Storage(format!("Failed to serialize storage: {}", e)))?;

        std::fs::write(&self.storage_path, json).map_err(|e| {
            WeaveError::Storage(format!(
                "Failed to write storage to {}: {}",
                self.storage_path.display(),
                e
            ))
        })
    }

    fn load(path: &Path) -> Result<IndexMap<String, Value>> {
        if !path.exists() {
            return Ok(IndexMap::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            WeaveError::Storage(format!(
                "Failed to read storage from {}: {}",
                path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(IndexMap::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| WeaveError::Storage(format!("Failed to parse storage JSON: {}", e)))
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.lock().map_err(lock_err)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock().map_err(lock_err)?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.save(&next)?;
        *entries = next;
        Ok(())
    }

    fn get_all(&self) -> Result<IndexMap<String, Value>> {
        let entries = self.entries.lock().map_err(lock_err)?;
        Ok(entries.clone())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(lock_err)?;
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.shift_remove(key);
        self.save(&next)?;
        *entries = next;
        Ok(true)
    }
}
