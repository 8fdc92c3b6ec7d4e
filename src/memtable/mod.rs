pub mod skiplist;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::comparator::Comparator;
use crate::types::{SequenceNumber, ValueType};
use skiplist::{SkipList, SkipListIterator};

/// Outcome of a point lookup at a sequence horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// The newest visible record is a put.
    Value(Vec<u8>),
    /// The newest visible record is a tombstone.
    Deleted,
}

/// In-memory sorted buffer of committed records. Wraps a SkipList.
///
/// Every write lands here after its log record is on disk. Deletes are
/// tombstones: older versions of the key still sit below them and remain
/// visible to readers whose horizon predates the delete.
pub struct MemTable {
    data: SkipList,
}

impl MemTable {
    /// Create a new empty memtable ordered by `cmp`.
    pub fn new(cmp: Arc<dyn Comparator>) -> Self {
        MemTable {
            data: SkipList::new(cmp),
        }
    }

    /// Record one operation at `sequence`.
    pub fn add(&mut self, sequence: SequenceNumber, value_type: ValueType, key: &[u8], value: &[u8]) {
        let value = match value_type {
            ValueType::Put => value.to_vec(),
            ValueType::Delete => Vec::new(),
        };
        self.data.insert(key.to_vec(), sequence, value_type, value);
    }

    /// Look up the newest record for `key` with sequence <= `horizon`.
    /// Returns None if no such record exists.
    pub fn get(&self, key: &[u8], horizon: SequenceNumber) -> Option<LookupResult> {
        let idx = self.data.find_greater_or_equal(key, horizon, ValueType::Put)?;
        if self.data.comparator().compare(self.data.key(idx), key) != Ordering::Equal {
            return None;
        }
        match self.data.value_type(idx) {
            ValueType::Put => Some(LookupResult::Value(self.data.value(idx).to_vec())),
            ValueType::Delete => Some(LookupResult::Deleted),
        }
    }

    /// Return a sorted iterator over all records (including tombstones and
    /// shadowed versions).
    pub fn iter(&self) -> SkipListIterator<'_> {
        self.data.iter()
    }

    pub(crate) fn list(&self) -> &SkipList {
        &self.data
    }

    pub fn comparator(&self) -> &Arc<dyn Comparator> {
        self.data.comparator()
    }

    /// Current memory usage in bytes.
    pub fn size(&self) -> usize {
        self.data.size_bytes()
    }

    /// Number of records, counting every version.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Build a new memtable holding only the records some horizon in
    /// `horizons` can see.
    ///
    /// A version is kept if it is the newest version <= h for at least one
    /// h. If the oldest kept version of a key is a tombstone it is dropped
    /// too: with nothing older left below it, absence reads the same.
    pub fn retain_visible(&self, horizons: &BTreeSet<SequenceNumber>) -> MemTable {
        let list = &self.data;
        let cmp = Arc::clone(list.comparator());
        let mut out = MemTable::new(Arc::clone(&cmp));

        let mut node = list.first();
        while let Some(start) = node {
            let mut group = Vec::new();
            let mut cursor = Some(start);
            while let Some(i) = cursor {
                if cmp.compare(list.key(i), list.key(start)) != Ordering::Equal {
                    break;
                }
                group.push(i);
                cursor = list.next(i);
            }

            // Versions arrive newest first.
            let mut kept = Vec::new();
            let mut upper = SequenceNumber::MAX;
            for &i in &group {
                let seq = list.sequence(i);
                if seq < upper && horizons.range(seq..upper).next().is_some() {
                    kept.push(i);
                }
                upper = seq;
            }
            while kept
                .last()
                .is_some_and(|&i| list.value_type(i) == ValueType::Delete)
            {
                kept.pop();
            }

            for i in kept {
                out.add(list.sequence(i), list.value_type(i), list.key(i), list.value(i));
            }
            node = cursor;
        }
        out
    }
}
