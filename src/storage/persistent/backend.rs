//! Directory-backed [`KeyValueBackend`].
//!
//! Each key maps to `<dir>/<key>.snap`. Writes go to a temp file which is
//! fsynced (when configured) and renamed over the previous snapshot, so a
//! crash leaves either the old or the new snapshot, never a torn one.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::config::check_storage_key;
use crate::storage::persistent::codec;
use crate::storage::persistent::file_lock::DirLock;
use crate::storage::persistent::PersistentConfig;
use crate::storage::traits::{KeyValueBackend, StorageError};

const SNAPSHOT_EXT: &str = "snap";

fn unavailable(context: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::PersistenceUnavailable(format!("{context}: {err}"))
}

/// Snapshot files in one locked directory.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    config: PersistentConfig,
    lock: DirLock,
    write_gate: Mutex<()>,
    dir_sync: fn(&Path) -> std::io::Result<()>,
}

impl FileBackend {
    /// Opens (creating if needed) and locks `dir`.
    ///
    /// # Errors
    /// `PersistenceUnavailable` if the directory cannot be created or is
    /// locked by another process.
    pub fn open(dir: impl AsRef<Path>, config: PersistentConfig) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| unavailable("failed to create data directory", e))?;
        let lock = DirLock::acquire(&dir).map_err(|e| unavailable("failed to acquire lock", e))?;

        tracing::debug!(
            dir = %dir.display(),
            sync_on_write = config.sync_on_write,
            "file backend opened"
        );

        Ok(Self {
            dir,
            config,
            lock,
            write_gate: Mutex::new(()),
            dir_sync: sync_dir,
        })
    }

    /// Data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the lock file held by this backend.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }

    /// Path of the snapshot file for `key`.
    ///
    /// # Errors
    /// `InvalidDocument` if `key` is not a valid storage key.
    pub fn snapshot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        check_storage_key(key).map_err(|e| StorageError::InvalidDocument(e.to_string()))?;
        Ok(self.dir.join(format!("{key}.{SNAPSHOT_EXT}")))
    }

    /// Writes `bytes` to `path` through a temp file and rename.
    ///
    /// The write is committed once the rename succeeds. A failed directory
    /// sync after that point is logged, not returned, since the new snapshot
    /// is already what a reopen will load.
    fn write_atomically(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let suffix = Uuid::new_v4().simple();
        let temp_path = path.with_extension(format!("{SNAPSHOT_EXT}.tmp.{suffix}"));

        let result = (|| {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            file.write_all(bytes)?;
            if self.config.sync_on_write {
                file.sync_all()?;
            }
            fs::rename(&temp_path, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
            return result;
        }

        if self.config.sync_on_write {
            if let Err(err) = (self.dir_sync)(&self.dir) {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %err,
                    "snapshot renamed but directory sync failed"
                );
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueBackend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.snapshot_path(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable("failed to read snapshot", e)),
        };

        codec::decode(&bytes, self.config.max_snapshot_size)
            .map(Some)
            .map_err(|e| StorageError::CorruptSnapshot {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.snapshot_path(key)?;
        if value.len() > self.config.max_snapshot_size {
            return Err(StorageError::InvalidDocument(format!(
                "snapshot of {} bytes exceeds max_snapshot_size {}",
                value.len(),
                self.config.max_snapshot_size
            )));
        }
        let framed =
            codec::encode(value).map_err(|e| StorageError::InvalidDocument(e.to_string()))?;

        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| unavailable("poisoned lock", "file.store"))?;
        self.write_atomically(&path, &framed)
            .map_err(|e| unavailable("failed to write snapshot", e))
    }
}
