//! Durable file-backed storage.
//!
//! A data directory holds one framed snapshot file per storage key plus a
//! lock file:
//!
//! ```text
//! vitalstore.db/
//! ├── .vitalstore.lock           exclusive, held while the store is open
//! └── livestock_db_docs_v1.snap  [VITL][ver][len][json][crc32]
//! ```
//!
//! Snapshots are replaced with write-temp-then-rename, so a crash mid-write
//! leaves the previous snapshot intact.

mod backend;
mod codec;
mod file_lock;

pub use backend::FileBackend;
pub use codec::MAGIC;
pub use file_lock::DirLock;

use std::path::Path;

use crate::config::StoreConfig;
use crate::error::{ValidationError, VitalsResult};
use crate::storage::RecordStore;

/// Configuration for the file backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentConfig {
    /// Whether to fsync the snapshot and its directory after every write.
    pub sync_on_write: bool,
    /// Largest snapshot accepted on write or read (bytes).
    pub max_snapshot_size: usize,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_snapshot_size: 64 * 1024 * 1024, // 64 MiB
        }
    }
}

impl PersistentConfig {
    const MIN_SNAPSHOT_SIZE: usize = 4 * 1024;

    /// Validates the configuration.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_snapshot_size < Self::MIN_SNAPSHOT_SIZE {
            return Err(ValidationError::InvalidConfig {
                field: "max_snapshot_size".to_string(),
                reason: format!(
                    "must be at least {} bytes (got {})",
                    Self::MIN_SNAPSHOT_SIZE,
                    self.max_snapshot_size
                ),
            });
        }
        Ok(self)
    }
}

/// Open or create a durable record store in the given directory.
///
/// # Errors
/// - `Validation` if either configuration is invalid
/// - `PersistenceUnavailable` if the directory cannot be created or another
///   process holds it
/// - `CorruptSnapshot` if the existing snapshot fails its checksum and
///   `recover_corrupt_snapshot` is off
///
/// # Example
/// ```rust,ignore
/// use vitalstore::storage::persistent::open_store;
///
/// let store = open_store("./vitalstore.db", StoreConfig::default(), None)?;
/// store.seed_if_empty(vec![Document::new("C-01", "cow")])?;
/// ```
pub fn open_store(
    path: impl AsRef<Path>,
    store_config: StoreConfig,
    config: Option<PersistentConfig>,
) -> VitalsResult<RecordStore> {
    let cfg = config.unwrap_or_default().validate()?;
    let backend = FileBackend::open(path, cfg)?;
    RecordStore::open(backend, store_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = PersistentConfig::default().validate().unwrap();
        assert!(cfg.sync_on_write);
    }

    #[test]
    fn test_tiny_snapshot_limit_rejected() {
        let cfg = PersistentConfig {
            max_snapshot_size: 16,
            ..PersistentConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
