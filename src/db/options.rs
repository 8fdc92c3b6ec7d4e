use std::fmt;
use std::sync::Arc;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use crate::wal::MAX_PAYLOAD;

/// Default memtable size before retention runs.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Options recognized by `Db::open`.
#[derive(Clone)]
pub struct Options {
    /// Create an empty store if none exists at the path.
    pub create_if_missing: bool,
    /// Fail if a store already exists at the path.
    pub error_if_exists: bool,
    /// Key order. Its name is persisted and must match on reopen.
    pub comparator: Arc<dyn Comparator>,
    /// Memtable size (bytes) above which obsolete versions are purged and
    /// the log rewritten.
    pub write_buffer_size: usize,
    /// Largest encoded batch `write` accepts. At most the log's record
    /// limit, which is also the default.
    pub max_batch_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            create_if_missing: false,
            error_if_exists: false,
            comparator: Arc::new(BytewiseComparator),
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            max_batch_size: MAX_PAYLOAD,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_if_missing(mut self, yes: bool) -> Self {
        self.create_if_missing = yes;
        self
    }

    pub fn error_if_exists(mut self, yes: bool) -> Self {
        self.error_if_exists = yes;
        self
    }

    pub fn comparator(mut self, cmp: impl Comparator + 'static) -> Self {
        self.comparator = Arc::new(cmp);
        self
    }

    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    pub fn max_batch_size(mut self, bytes: usize) -> Self {
        self.max_batch_size = bytes;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.write_buffer_size == 0 {
            return Err(Error::InvalidArgument(
                "write_buffer_size must be positive".into(),
            ));
        }
        if self.max_batch_size == 0 || self.max_batch_size > MAX_PAYLOAD {
            return Err(Error::InvalidArgument(format!(
                "max_batch_size must be in 1..={MAX_PAYLOAD}"
            )));
        }
        if self.comparator.name().is_empty() {
            return Err(Error::InvalidArgument("comparator name is empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("create_if_missing", &self.create_if_missing)
            .field("error_if_exists", &self.error_if_exists)
            .field("comparator", &self.comparator.name())
            .field("write_buffer_size", &self.write_buffer_size)
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

/// Options for `Db::write`, `Db::put` and `Db::delete`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Flush the log record to stable storage before returning.
    pub sync: bool,
}

impl WriteOptions {
    pub fn sync() -> Self {
        WriteOptions { sync: true }
    }
}

/// Options for `Db::get` and `Db::iter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions<'a> {
    /// Read at this snapshot instead of the latest state.
    pub snapshot: Option<&'a Snapshot>,
}

impl<'a> ReadOptions<'a> {
    pub fn at(snapshot: &'a Snapshot) -> Self {
        ReadOptions {
            snapshot: Some(snapshot),
        }
    }
}
