//! Advisory File Lock
//!
//! Cross-process coordination for the document file. Writers hold an
//! exclusive `flock` on `<document>.lock` across the whole
//! load → mutate → snapshot → save cycle; readers hold a shared lock while
//! re-loading. The lock is released when the guard drops.

use crate::db::BackendError;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lock flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Held advisory lock, released on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// Acquire a lock on `path`, polling until `timeout` elapses
    ///
    /// The lock file is created if missing and never removed: deleting a
    /// lock file another process already opened would split the lock.
    pub fn acquire(path: &Path, mode: LockMode, timeout: Duration) -> Result<Self, BackendError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| BackendError::io(path, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            if try_lock(&file, mode).map_err(|e| BackendError::io(path, e))? {
                tracing::trace!("Acquired {:?} lock on {}", mode, path.display());
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    mode,
                });
            }

            if Instant::now() >= deadline {
                return Err(BackendError::lock(
                    path,
                    format!("timed out after {}ms", timeout.as_millis()),
                ));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unlock(&self.file);
        tracing::trace!("Released {:?} lock on {}", self.mode, self.path.display());
    }
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let operation = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    };
    let ret = unsafe { libc::flock(file.as_raw_fd(), operation | libc::LOCK_NB) };
    if ret == 0 {
        return Ok(true);
    }

    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::EWOULDBLOCK || code == libc::EINTR => Ok(false),
        _ => Err(err),
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// TODO: use LockFileEx on Windows; until then only in-process locking applies there
#[cfg(not(unix))]
fn try_lock(_file: &File, _mode: LockMode) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
