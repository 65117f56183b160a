//! Storage backend trait and storage errors.
//!
//! The record store persists its whole state as one textual snapshot under a
//! well-known key. Anything that can durably map a string key to a string
//! value can host it:
//! - [`InMemoryBackend`](super::InMemoryBackend) for tests and embedded use
//! - the file backend behind the `persistent` feature

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::document::DocumentId;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The operation addressed a document id that does not exist.
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    /// Input to `put`/`bulk_insert` cannot be stored faithfully.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The backing medium is inaccessible.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// A stored snapshot could not be decoded.
    #[error("Corrupt snapshot under '{key}': {reason}")]
    CorruptSnapshot {
        #[allow(missing_docs)]
        key: String,
        #[allow(missing_docs)]
        reason: String,
    },

    /// A change handler tried to mutate the store that is notifying it.
    #[error("Store mutation attempted from inside a change handler")]
    ReentrantMutation,
}

/// Durable string key-value space hosting store snapshots.
///
/// # Contract
/// - `store` returns only after the value is durable as far as the backend can tell
/// - `load` after a successful `store` returns the stored value (read-your-writes)
pub trait KeyValueBackend: Send + Sync + fmt::Debug {
    /// Returns the value stored under `key`, or `None` if the key was never written.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the value stored under `key`.
    fn store(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueBackend + ?Sized> KeyValueBackend for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).store(key, value)
    }
}

impl<T: KeyValueBackend + ?Sized> KeyValueBackend for Box<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).store(key, value)
    }
}
