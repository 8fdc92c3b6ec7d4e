//! # kvlite
//!
//! An embedded, ordered, persistent key-value engine for a single process.
//!
//! ## Core idea
//! Every committed batch is appended to a write-ahead log and then inserted
//! into an in-memory skip list of versioned records, each stamped with a
//! sequence number. Reads pick, per key, the newest record at or below
//! their horizon: the latest sequence number, or one pinned by a snapshot.
//! Keys are ordered by a pluggable comparator whose name is persisted with
//! the store.
//!
//! ```no_run
//! use kvlite::{Db, Options, ReadOptions, WriteBatch, WriteOptions};
//!
//! # fn main() -> kvlite::Result<()> {
//! let db = Db::open("/tmp/kvlite-doc", Options::new().create_if_missing(true))?;
//! db.put(&WriteOptions::default(), "K1", "VAL")?;
//!
//! let mut batch = WriteBatch::new();
//! batch.delete("K1").put("K2", "VAL");
//! db.write(&WriteOptions::sync(), &batch)?;
//!
//! assert_eq!(db.get(&ReadOptions::default(), "K2")?, Some(b"VAL".to_vec()));
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod comparator;
pub mod db;
pub mod error;
pub mod iterator;
pub mod lock;
pub mod manifest;
pub mod memtable;
pub mod snapshot;
pub mod types;
pub mod wal;

// Public re-exports for the top-level API
pub use batch::{BatchHandler, WriteBatch};
pub use comparator::{BytewiseComparator, Comparator};
pub use db::{destroy, repair, Db, Options, ReadOptions, RepairReport, Stats, WriteOptions};
pub use error::{Error, Result};
pub use iterator::{DbIterator, StorageIterator};
pub use snapshot::Snapshot;
