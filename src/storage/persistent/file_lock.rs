//! Exclusive lock on a data directory.
//!
//! Two processes writing the same snapshot file would silently overwrite
//! each other's state, so a data directory is opened by one process at a
//! time. The lock lives as long as the [`DirLock`] value.

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".vitalstore.lock";

/// Held exclusive lock on a data directory.
#[derive(Debug)]
pub struct DirLock {
    _file: File,
    path: PathBuf,
}

impl DirLock {
    /// Locks `dir`, failing immediately if another process holds it.
    ///
    /// # Errors
    /// - `ErrorKind::WouldBlock` if the directory is in use
    /// - any I/O error creating the lock file
    pub fn acquire(dir: &Path) -> IoResult<Self> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if !lock_exclusive(&file)? {
            return Err(IoError::new(
                ErrorKind::WouldBlock,
                format!("data directory {} is in use by another process", dir.display()),
            ));
        }

        Ok(Self { _file: file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Non-blocking exclusive lock. `Ok(false)` means someone else holds it.
/// Released by the OS when the file handle closes.
#[cfg(unix)]
fn lock_exclusive(file: &File) -> IoResult<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: `file` owns a valid descriptor for the duration of the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = IoError::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn lock_exclusive(file: &File) -> IoResult<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    let handle = file.as_raw_handle() as HANDLE;
    // SAFETY: `handle` is valid while `file` is alive; OVERLAPPED is plain data.
    let ok = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            handle,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if ok != 0 {
        return Ok(true);
    }
    let err = IoError::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(any(unix, windows)))]
fn lock_exclusive(_file: &File) -> IoResult<bool> {
    Err(IoError::new(
        ErrorKind::Unsupported,
        "directory locking is not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_file_created() {
        let dir = tempdir().unwrap();
        let lock = DirLock::acquire(dir.path()).unwrap();
        assert!(lock.path().ends_with(LOCK_FILE));
        assert!(lock.path().exists());
    }

    #[test]
    fn test_second_acquire_would_block() {
        let dir = tempdir().unwrap();
        let _held = DirLock::acquire(dir.path()).unwrap();

        let err = DirLock::acquire(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempdir().unwrap();
        drop(DirLock::acquire(dir.path()).unwrap());
        assert!(DirLock::acquire(dir.path()).is_ok());
    }
}
