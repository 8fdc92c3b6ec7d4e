//! The engine handle.
//!
//! Write path (single writer, serialized by `writer`):
//!   1. stamp the batch with the next contiguous block of sequence numbers
//!   2. append it to the WAL as one record (fsync if asked)
//!   3. insert every op into the memtable
//!   4. publish the new last sequence number
//!
//! Readers take their horizon from the published sequence number, so a
//! batch becomes visible all at once in step 4 or not at all.

mod options;
mod recovery;
mod repair;

pub use options::{Options, ReadOptions, WriteOptions, DEFAULT_WRITE_BUFFER_SIZE};
pub use repair::{destroy, repair, RepairReport};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::batch::{BatchOp, WriteBatch};
use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::iterator::{DbIterator, StorageIterator};
use crate::lock::FileLock;
use crate::manifest::{self, Manifest};
use crate::memtable::{LookupResult, MemTable};
use crate::snapshot::{Snapshot, SnapshotList};
use crate::types::SequenceNumber;
use crate::wal::{encode_ops, WALManager};

/// Point-in-time engine counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub last_sequence: SequenceNumber,
    /// Registered horizons: caller snapshots plus open iterators.
    pub live_snapshots: usize,
    /// Lowest pinned sequence number, if any horizon is registered.
    pub oldest_snapshot: Option<SequenceNumber>,
    /// Records in the memtable, counting every retained version.
    pub memtable_entries: usize,
    pub memtable_bytes: usize,
    pub log_number: u64,
    pub compactions: u64,
}

struct WriterState {
    /// None once closed.
    logs: Option<WALManager>,
    manifest: Manifest,
    compactions: u64,
    /// Memtable size that triggers the next retention pass.
    compact_threshold: usize,
}

/// An open store. `Send + Sync`; share it across threads with `Arc`.
///
/// Dropping the handle closes it. Snapshots and iterators obtained from it
/// fail with `UseAfterClose` afterwards.
pub struct Db {
    path: PathBuf,
    options: Options,
    /// Current memtable. Swapped only by retention, under the writer lock.
    mem: RwLock<Arc<RwLock<MemTable>>>,
    writer: Mutex<WriterState>,
    last_sequence: AtomicU64,
    snapshots: Arc<SnapshotList>,
    closed: Arc<AtomicBool>,
    lock: Mutex<Option<FileLock>>,
}

impl Db {
    /// Open the store at `path`, replaying its log.
    pub fn open(path: impl AsRef<Path>, options: Options) -> Result<Db> {
        let path = path.as_ref().to_path_buf();
        options.validate()?;

        if !path.is_dir() {
            if !options.create_if_missing {
                return Err(Error::NotFound(format!(
                    "{}: does not exist (create_if_missing is false)",
                    path.display()
                )));
            }
            fs::create_dir_all(&path)?;
        }

        let lock = FileLock::acquire(&path)?;
        manifest::remove_stale_tmp(&path)?;

        let comparator = options.comparator.name().to_string();
        let manifest = match Manifest::load(&path)? {
            Some(existing) => {
                if options.error_if_exists {
                    return Err(Error::InvalidArgument(format!(
                        "{}: exists (error_if_exists is true)",
                        path.display()
                    )));
                }
                if existing.comparator != comparator {
                    return Err(Error::ComparatorMismatch {
                        expected: existing.comparator,
                        found: comparator,
                    });
                }
                existing
            }
            None => {
                if !options.create_if_missing {
                    return Err(Error::NotFound(format!(
                        "{}: no store (create_if_missing is false)",
                        path.display()
                    )));
                }
                let created = Manifest::new(&comparator);
                created.store(&path)?;
                info!(path = %path.display(), %comparator, "created store");
                created
            }
        };

        let recovered = recovery::recover(&path, &manifest, Arc::clone(&options.comparator))?;
        let logs = WALManager::open(&path, recovered.log_number)?;
        info!(
            path = %path.display(),
            records = recovered.records,
            last_sequence = recovered.last_sequence,
            log = recovered.log_number,
            "opened store"
        );

        let compact_threshold = options.write_buffer_size;
        Ok(Db {
            path,
            mem: RwLock::new(Arc::new(RwLock::new(recovered.mem))),
            writer: Mutex::new(WriterState {
                logs: Some(logs),
                manifest,
                compactions: 0,
                compact_threshold,
            }),
            last_sequence: AtomicU64::new(recovered.last_sequence),
            snapshots: Arc::new(SnapshotList::new()),
            closed: Arc::new(AtomicBool::new(false)),
            lock: Mutex::new(Some(lock)),
            options,
        })
    }

    /// Set `key` to `value`. A one-operation batch.
    pub fn put(&self, options: &WriteOptions, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(options, &batch)
    }

    /// Remove `key`. Deleting an absent key is not an error.
    pub fn delete(&self, options: &WriteOptions, key: impl AsRef<[u8]>) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(options, &batch)
    }

    /// Commit `batch` atomically.
    ///
    /// On error nothing from the batch is visible, now or after reopen.
    pub fn write(&self, options: &WriteOptions, batch: &WriteBatch) -> Result<()> {
        self.check_open()?;
        if batch.is_empty() {
            return Ok(());
        }
        if batch.approximate_size() > self.options.max_batch_size {
            return Err(Error::InvalidArgument(format!(
                "batch of {} bytes exceeds max_batch_size {}",
                batch.approximate_size(),
                self.options.max_batch_size
            )));
        }

        let mut writer = self.writer.lock();
        let logs = writer.logs.as_mut().ok_or(Error::UseAfterClose)?;

        let first = self.last_sequence.load(Ordering::Acquire) + 1;
        let encoded = encode_ops(first, batch.ops())?;
        logs.active_writer().append(&encoded, options.sync)?;

        {
            let current = self.mem.read();
            let mut table = current.write();
            for (i, op) in batch.ops().iter().enumerate() {
                table.add(first + i as u64, op.value_type, &op.key, &op.value);
            }
        }

        let last = first + batch.len() as u64 - 1;
        self.last_sequence.store(last, Ordering::Release);
        trace!(first, last, sync = options.sync, "committed batch");

        let size = self.mem.read().read().size();
        if size > writer.compact_threshold {
            // The batch is committed either way.
            if let Err(e) = self.compact_locked(&mut writer) {
                warn!(error = %e, "memtable retention failed");
            }
        }
        Ok(())
    }

    /// Look up `key`. `Ok(None)` if it has no visible value at the read
    /// horizon. The value is an owned copy.
    pub fn get(&self, options: &ReadOptions<'_>, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        // Hold the memtable slot so the horizon and table agree.
        let current = self.mem.read();
        let horizon = self.horizon(options)?;
        let found = current.read().get(key.as_ref(), horizon);
        Ok(match found {
            Some(LookupResult::Value(v)) => Some(v),
            Some(LookupResult::Deleted) | None => None,
        })
    }

    /// Open an iterator over the keyspace at the read horizon. The horizon
    /// is fixed now; later writes are invisible to it.
    pub fn iter(&self, options: &ReadOptions<'_>) -> Result<DbIterator> {
        self.check_open()?;
        let current = self.mem.read();
        let horizon = self.horizon(options)?;
        let pin = self.snapshots.acquire(horizon);
        Ok(DbIterator::new(
            Arc::clone(&current),
            Arc::clone(&self.closed),
            pin,
        ))
    }

    /// Capture the latest committed sequence number.
    pub fn get_snapshot(&self) -> Result<Snapshot> {
        self.check_open()?;
        Ok(self
            .snapshots
            .acquire(self.last_sequence.load(Ordering::Acquire)))
    }

    /// Release `snapshot` before it is dropped. Releasing twice, or a
    /// snapshot from another handle, is `InvalidSnapshot`.
    pub fn release_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.check_open()?;
        self.snapshots.release(snapshot)
    }

    /// Purge versions no live horizon can see and rewrite the log.
    pub fn compact(&self) -> Result<()> {
        self.check_open()?;
        let mut writer = self.writer.lock();
        self.compact_locked(&mut writer)
    }

    /// Sync the log and release the directory lock. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let result = match self.writer.lock().logs.take() {
            Some(mut logs) => logs.active_writer().sync(),
            None => Ok(()),
        };
        self.lock.lock().take();
        info!(path = %self.path.display(), "closed store");
        result
    }

    pub fn stats(&self) -> Stats {
        let (memtable_entries, memtable_bytes) = {
            let current = self.mem.read();
            let table = current.read();
            (table.len(), table.size())
        };
        let writer = self.writer.lock();
        Stats {
            last_sequence: self.last_sequence.load(Ordering::Acquire),
            live_snapshots: self.snapshots.len(),
            oldest_snapshot: self.snapshots.oldest(),
            memtable_entries,
            memtable_bytes,
            log_number: writer
                .logs
                .as_ref()
                .map_or(writer.manifest.log_number, WALManager::number),
            compactions: writer.compactions,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn comparator(&self) -> &Arc<dyn Comparator> {
        &self.options.comparator
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::UseAfterClose);
        }
        Ok(())
    }

    fn horizon(&self, options: &ReadOptions<'_>) -> Result<SequenceNumber> {
        match options.snapshot {
            Some(snapshot) if self.snapshots.is_live(snapshot) => Ok(snapshot.sequence()),
            Some(_) => Err(Error::InvalidSnapshot),
            None => Ok(self.last_sequence.load(Ordering::Acquire)),
        }
    }

    /// Rebuild the memtable keeping what live horizons can see, then rotate
    /// the log so it holds exactly that. Caller holds the writer lock, so
    /// `last_sequence` is stable throughout.
    fn compact_locked(&self, writer: &mut WriterState) -> Result<()> {
        let last_sequence = self.last_sequence.load(Ordering::Acquire);
        let mut horizons = self.snapshots.live_sequences();
        horizons.insert(last_sequence);

        let old = Arc::clone(&*self.mem.read());
        let (rebuilt, before) = {
            let table = old.read();
            (table.retain_visible(&horizons), table.len())
        };

        let mut encoded = Vec::new();
        {
            let mut it = rebuilt.iter();
            while it.is_valid() {
                let op = BatchOp {
                    value_type: it.value_type(),
                    key: it.key().to_vec(),
                    value: it.value().to_vec(),
                };
                encoded.extend_from_slice(&encode_ops(it.sequence(), std::slice::from_ref(&op))?);
                it.next()?;
            }
        }

        let logs = writer.logs.as_mut().ok_or(Error::UseAfterClose)?;
        let old_log = logs.rotate()?;
        logs.active_writer().append(&encoded, true)?;

        writer.manifest.log_number = logs.number();
        writer.manifest.last_sequence = last_sequence;
        writer.manifest.store(&self.path)?;

        let after = rebuilt.len();
        let bytes = rebuilt.size();
        *self.mem.write() = Arc::new(RwLock::new(rebuilt));
        WALManager::delete_log(&old_log)?;

        writer.compactions += 1;
        writer.compact_threshold = self.options.write_buffer_size.max(bytes * 2);
        debug!(old_log = %old_log.display(), "removed rotated log");
        info!(
            before,
            after,
            horizons = horizons.len(),
            log = writer.manifest.log_number,
            "rebuilt memtable"
        );
        Ok(())
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "error closing store");
        }
    }
}
