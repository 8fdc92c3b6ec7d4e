//! Exclusive advisory lock over a store directory.
//!
//! The `LOCK` file in the directory is held with `flock(LOCK_EX | LOCK_NB)`
//! for the life of the handle, so a second process fails fast instead of
//! blocking. The kernel drops the lock if the process dies. A process-wide
//! table of held paths covers a second open from the same process, which
//! on some platforms would otherwise share the kernel lock.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use parking_lot::{const_mutex, Mutex};
use tracing::debug;

use crate::error::{Error, Result};

pub const LOCK_FILE: &str = "LOCK";

static HELD: Mutex<BTreeSet<PathBuf>> = const_mutex(BTreeSet::new());

/// Held lock on a store directory. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Option<File>,
}

impl FileLock {
    /// Lock `dir`, which must exist. Fails with `AlreadyLocked` if any live
    /// handle holds it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.canonicalize()?.join(LOCK_FILE);

        if !HELD.lock().insert(path.clone()) {
            return Err(Error::AlreadyLocked(path));
        }

        match Self::lock_file(&path) {
            Ok(file) => {
                debug!(path = %path.display(), "acquired lock");
                Ok(FileLock {
                    path,
                    file: Some(file),
                })
            }
            Err(e) => {
                HELD.lock().remove(&path);
                Err(e)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn lock_file(path: &Path) -> Result<File> {
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        // SAFETY: the fd is owned by `file` and open for the whole call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                return Err(Error::AlreadyLocked(path.to_path_buf()));
            }
            return Err(err.into());
        }
        Ok(file)
    }

    #[cfg(not(unix))]
    fn lock_file(path: &Path) -> Result<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Closing the file releases the flock; do it before the path is
        // offered to other openers.
        drop(self.file.take());
        HELD.lock().remove(&self.path);
        debug!(path = %self.path.display(), "released lock");
    }
}
