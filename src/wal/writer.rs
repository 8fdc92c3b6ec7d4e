use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// The file operations a log writer needs. Implemented for `File`; tests
/// substitute a file that fails on demand.
pub(crate) trait LogFile: Send {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn sync_data(&mut self) -> io::Result<()>;
    fn sync_all(&mut self) -> io::Result<()>;
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        File::sync_all(self)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

/// Appends framed WAL records to a file on disk.
///
/// Each record is handed to the OS with a single `write_all`, so a crash
/// leaves at most one partial frame at the tail. Two layers of durability:
///   write_all()    → OS page cache (survives process crash)
///   sync_data()    → physical disk (survives power loss)
///
/// A failed append is rolled back by truncating the file to where the
/// record started, so a failed commit leaves no trace in the log.
pub struct WALWriter {
    file: Box<dyn LogFile>,
    path: PathBuf,
    offset: u64,
    poisoned: bool,
}

impl WALWriter {
    /// Open (or create) a WAL file for appending.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();
        Ok(WALWriter {
            file: Box::new(file),
            path: path.to_path_buf(),
            offset,
            poisoned: false,
        })
    }

    /// Swap the underlying file, keeping path and offset.
    #[cfg(test)]
    pub(crate) fn replace_file(&mut self, file: Box<dyn LogFile>) {
        self.file = file;
    }

    /// Append one encoded record. With `sync`, returns only after the
    /// record reached stable storage.
    pub fn append(&mut self, encoded: &[u8], sync: bool) -> Result<()> {
        if self.poisoned {
            return Err(Error::Io(io::Error::other(format!(
                "log {} unusable after failed rollback",
                self.path.display()
            ))));
        }

        let start = self.offset;
        let result = self.file.write_all(encoded).and_then(|()| {
            if sync {
                self.file.sync_data()
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => {
                self.offset += encoded.len() as u64;
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "log append failed, rolling back");
                if let Err(rollback) = self.file.set_len(start) {
                    warn!(error = %rollback, "log rollback failed");
                    self.poisoned = true;
                }
                Err(e.into())
            }
        }
    }

    /// Force fsync to disk. Ensures all appended records are durable.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Current file offset (bytes written so far).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Manages numbered WAL files in a store directory.
///
/// Rotation happens when the memtable is rebuilt:
/// 1. Create a new WAL and write the retained records into it
/// 2. Sync it and point the manifest at it
/// 3. Delete the old WAL
///
/// The old WAL is only deleted AFTER the new one is fsync'd and the
/// manifest names it. Violating this loses data.
pub struct WALManager {
    dir: PathBuf,
    active: WALWriter,
    number: u64,
}

impl WALManager {
    /// Open log `number` in `dir` for appending.
    pub fn open(dir: &Path, number: u64) -> Result<Self> {
        let active = WALWriter::new(&log_path(dir, number))?;
        Ok(WALManager {
            dir: dir.to_path_buf(),
            active,
            number,
        })
    }

    /// Rotate: start a new WAL and make it active.
    /// Returns the path of the old WAL (caller deletes once the new one is
    /// durable and recorded).
    pub fn rotate(&mut self) -> Result<PathBuf> {
        self.active.sync()?;
        let next = self.number + 1;
        let writer = WALWriter::new(&log_path(&self.dir, next))?;
        let old = std::mem::replace(&mut self.active, writer);
        self.number = next;
        debug!(number = next, "rotated log");
        Ok(old.path)
    }

    pub fn active_writer(&mut self) -> &mut WALWriter {
        &mut self.active
    }

    /// Number of the active log.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Delete an old WAL file (safe only after its contents are durable
    /// elsewhere).
    pub fn delete_log(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Path of WAL number `number` inside `dir`.
pub fn log_path(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("{number:06}.wal"))
}

/// All WAL files in `dir`, sorted by number.
pub fn list_logs(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "wal") {
            if let Some(number) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                logs.push((number, path));
            }
        }
    }
    logs.sort_by_key(|(number, _)| *number);
    Ok(logs)
}

/// A log file that writes through to a real file but fails chosen steps.
#[cfg(test)]
pub(crate) struct FailingFile {
    pub inner: File,
    pub fail_sync: bool,
    pub fail_set_len: bool,
}

#[cfg(test)]
impl LogFile for FailingFile {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.inner, buf)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        if self.fail_sync {
            return Err(io::Error::other("injected sync failure"));
        }
        self.inner.sync_data()
    }

    fn sync_all(&mut self) -> io::Result<()> {
        self.inner.sync_all()
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        if self.fail_set_len {
            return Err(io::Error::other("injected truncate failure"));
        }
        self.inner.set_len(len)
    }
}
