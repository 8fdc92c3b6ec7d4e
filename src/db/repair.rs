use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::db::Options;
use crate::error::{Error, Result};
use crate::lock::FileLock;
use crate::manifest::{self, Manifest};
use crate::wal::{list_logs, WALManager, WALReader};

/// What `repair` found and changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub logs_scanned: usize,
    pub records_kept: usize,
    pub bytes_dropped: u64,
}

/// Best-effort recovery of a store that fails to open with `Corruption`.
///
/// Truncates every live log at its first invalid record, discarding that
/// record and everything after it in the same log. A missing or unreadable
/// manifest is rebuilt with `options.comparator`'s name. An existing
/// manifest naming a different comparator is still `ComparatorMismatch`.
pub fn repair(path: impl AsRef<Path>, options: &Options) -> Result<RepairReport> {
    let dir = path.as_ref();
    options.validate()?;
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("{}: does not exist", dir.display())));
    }

    let _lock = FileLock::acquire(dir)?;
    manifest::remove_stale_tmp(dir)?;
    let logs = list_logs(dir)?;
    let comparator = options.comparator.name();

    let mut manifest = match Manifest::load(dir) {
        Ok(Some(existing)) if existing.comparator != comparator => {
            return Err(Error::ComparatorMismatch {
                expected: existing.comparator,
                found: comparator.to_string(),
            });
        }
        Ok(Some(existing)) => existing,
        Ok(None) | Err(Error::Corruption(_)) => {
            warn!(path = %dir.display(), "rebuilding manifest");
            let mut rebuilt = Manifest::new(comparator);
            rebuilt.log_number = logs.first().map_or(1, |(number, _)| *number);
            rebuilt
        }
        Err(e) => return Err(e),
    };

    let mut report = RepairReport::default();
    for (number, log) in &logs {
        if *number < manifest.log_number {
            continue;
        }
        let reader = WALReader::new(log)?;
        let mut iter = reader.iter();
        for record in iter.by_ref() {
            let Ok(record) = record else {
                break;
            };
            if !record.batch.is_empty() {
                report.records_kept += 1;
                manifest.last_sequence = manifest.last_sequence.max(record.last_sequence());
            }
        }

        let valid = iter.offset() as u64;
        let dropped = reader.len() as u64 - valid;
        if dropped > 0 {
            warn!(path = %log.display(), dropped, "truncating log");
            let file = OpenOptions::new().write(true).open(log)?;
            file.set_len(valid)?;
            file.sync_all()?;
            report.bytes_dropped += dropped;
        }
        report.logs_scanned += 1;
    }

    manifest.store(dir)?;
    info!(
        path = %dir.display(),
        logs = report.logs_scanned,
        records = report.records_kept,
        dropped = report.bytes_dropped,
        "repaired store"
    );
    Ok(report)
}

/// Delete the store at `path`. A missing directory is not an error.
///
/// Takes the directory lock first, so a store held open elsewhere fails
/// with `AlreadyLocked`. Files the engine did not create are left alone,
/// and so is the directory if any remain.
pub fn destroy(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    if !dir.is_dir() {
        return Ok(());
    }

    let lock = FileLock::acquire(dir)?;
    for (_, log) in list_logs(dir)? {
        WALManager::delete_log(&log)?;
    }
    remove_if_exists(&Manifest::path(dir))?;
    manifest::remove_stale_tmp(dir)?;

    let lock_path = lock.path().to_path_buf();
    drop(lock);
    remove_if_exists(&lock_path)?;

    if let Err(e) = fs::remove_dir(dir) {
        debug!(path = %dir.display(), error = %e, "leaving store directory");
    }
    info!(path = %dir.display(), "destroyed store");
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
