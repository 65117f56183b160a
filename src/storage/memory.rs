//! In-memory storage backend.
//!
//! Thread-safe, process-lifetime key space. Intended for embedded usage and
//! tests; it can be switched "unavailable" to exercise persistence failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use crate::storage::traits::{KeyValueBackend, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::PersistenceUnavailable(format!("poisoned lock: {context}"))
}

/// Thread-safe in-memory key space.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    values: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with one value.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let backend = Self::default();
        if let Ok(mut values) = backend.values.write() {
            values.insert(key.into(), value.into());
        }
        backend
    }

    /// Simulate loss (or recovery) of the backing medium.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `store` calls.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw value under `key`, bypassing the availability switch.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::PersistenceUnavailable(
                "in-memory backend marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl KeyValueBackend for InMemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        let values = self.values.read().map_err(|_| lock_err("memory.load"))?;
        Ok(values.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut values = self.values.write().map_err(|_| lock_err("memory.store"))?;
        values.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
