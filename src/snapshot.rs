//! Registry of live read horizons.
//!
//! Every held `Snapshot` (and every open iterator, which holds one
//! internally) registers its sequence number here. Memtable retention never
//! purges a record some registered horizon can still see.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::types::SequenceNumber;

#[derive(Default)]
struct Registry {
    next_id: u64,
    live: BTreeMap<u64, SequenceNumber>,
}

/// Tracks which sequence numbers live snapshots pin.
#[derive(Default)]
pub struct SnapshotList {
    inner: Mutex<Registry>,
}

impl SnapshotList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sequence` as a live horizon and hand back its handle.
    pub fn acquire(self: &Arc<Self>, sequence: SequenceNumber) -> Snapshot {
        let mut reg = self.inner.lock();
        let id = reg.next_id;
        reg.next_id += 1;
        reg.live.insert(id, sequence);
        Snapshot {
            id,
            sequence,
            list: Arc::clone(self),
        }
    }

    /// Deregister a snapshot. Releasing twice is `InvalidSnapshot`.
    pub fn release(&self, snapshot: &Snapshot) -> Result<()> {
        if !self.owns(snapshot) {
            return Err(Error::InvalidSnapshot);
        }
        self.inner
            .lock()
            .live
            .remove(&snapshot.id)
            .map(|_| ())
            .ok_or(Error::InvalidSnapshot)
    }

    /// Whether `snapshot` came from this list and is still registered.
    pub fn is_live(&self, snapshot: &Snapshot) -> bool {
        self.owns(snapshot) && self.inner.lock().live.contains_key(&snapshot.id)
    }

    /// Distinct sequence numbers pinned right now.
    pub fn live_sequences(&self) -> BTreeSet<SequenceNumber> {
        self.inner.lock().live.values().copied().collect()
    }

    pub fn oldest(&self) -> Option<SequenceNumber> {
        self.inner.lock().live.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn owns(&self, snapshot: &Snapshot) -> bool {
        std::ptr::eq(self, Arc::as_ptr(&snapshot.list))
    }
}

/// An immutable read horizon: "the latest sequence number as of capture".
///
/// Reads bound to a snapshot never observe a record newer than it. Dropping
/// the handle releases it; `Db::release_snapshot` releases it early and
/// reports a double release as `InvalidSnapshot`.
pub struct Snapshot {
    id: u64,
    sequence: SequenceNumber,
    list: Arc<SnapshotList>,
}

impl Snapshot {
    /// The sequence number this snapshot reads at.
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id)
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        // Already released explicitly is fine here.
        self.list.inner.lock().live.remove(&self.id);
    }
}
