//! Store identity record.
//!
//! `MANIFEST` is a small JSON document naming the comparator the store was
//! created with, the active log, and the last sequence number handed out
//! before the most recent log rotation. Its presence is what makes a
//! directory a store.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::SequenceNumber;

pub const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TMP: &str = "MANIFEST.tmp";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    /// `Comparator::name()` of the order the keyspace was built under.
    pub comparator: String,
    /// Logs numbered below this are obsolete.
    pub log_number: u64,
    pub last_sequence: SequenceNumber,
}

impl Manifest {
    pub fn new(comparator: &str) -> Self {
        Manifest {
            format_version: FORMAT_VERSION,
            comparator: comparator.to_string(),
            log_number: 1,
            last_sequence: 0,
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Read the manifest in `dir`. `Ok(None)` if there is none.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let file = match File::open(Self::path(dir)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest: Manifest = serde_json::from_reader(BufReader::new(file))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported manifest version {}",
                manifest.format_version
            )));
        }
        Ok(Some(manifest))
    }

    /// Atomically replace the manifest in `dir`.
    ///
    /// Writes a temp file, fsyncs it, renames it over `MANIFEST`, then
    /// fsyncs the directory so the rename itself is durable.
    pub fn store(&self, dir: &Path) -> Result<()> {
        let tmp = dir.join(MANIFEST_TMP);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, Self::path(dir))?;
        sync_dir(dir)
    }
}

/// Remove a temp manifest left behind by an interrupted `store`.
pub fn remove_stale_tmp(dir: &Path) -> Result<()> {
    match fs::remove_file(dir.join(MANIFEST_TMP)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// fsync a directory so renames and creates inside it are persisted.
pub fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let handle = File::open(dir)?;
        // SAFETY: the fd is owned by `handle` and open for the whole call.
        let rc = unsafe { libc::fsync(handle.as_raw_fd()) };
        if rc != 0 {
            return Err(io::Error::last_os_error().into());
        }
    }

    // Non-Unix platforms cannot fsync a directory; the rename is the best
    // we can do there.
    #[cfg(not(unix))]
    let _ = dir;

    Ok(())
}
