use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::memtable::skiplist::SkipList;
use crate::memtable::MemTable;
use crate::snapshot::Snapshot;
use crate::types::{SequenceNumber, ValueType, MAX_SEQUENCE};

/// Cursor over the user-visible keyspace at a fixed sequence horizon.
///
/// Walks internal records in comparator order and yields, for each user
/// key, the newest version at or below the horizon, skipping keys whose
/// visible version is a tombstone.
///
/// The horizon is pinned by an internal snapshot held for the iterator's
/// life, so later writes and memtable rebuilds change nothing it observes.
/// The memtable it walks is locked only for the duration of each move.
///
/// `key()`/`value()` are copies owned by the iterator, borrowed out for as
/// long as the iterator is not moved or dropped.
pub struct DbIterator {
    mem: Arc<RwLock<MemTable>>,
    closed: Arc<AtomicBool>,
    _pin: Snapshot,
    horizon: SequenceNumber,
    node: Option<usize>,
    key: Vec<u8>,
    value: Vec<u8>,
    valid: bool,
    failed: bool,
}

impl DbIterator {
    pub(crate) fn new(mem: Arc<RwLock<MemTable>>, closed: Arc<AtomicBool>, pin: Snapshot) -> Self {
        let horizon = pin.sequence();
        DbIterator {
            mem,
            closed,
            _pin: pin,
            horizon,
            node: None,
            key: Vec::new(),
            value: Vec::new(),
            valid: false,
            failed: false,
        }
    }

    /// The sequence number this iterator reads at.
    pub fn sequence(&self) -> SequenceNumber {
        self.horizon
    }

    /// `Err(UseAfterClose)` once the engine that produced this iterator
    /// has closed.
    pub fn status(&self) -> Result<()> {
        if self.failed || self.closed.load(AtomicOrdering::Acquire) {
            return Err(Error::UseAfterClose);
        }
        Ok(())
    }

    fn check_open(&mut self) -> Result<()> {
        if let Err(e) = self.status() {
            self.failed = true;
            self.invalidate();
            return Err(e);
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.valid = false;
        self.node = None;
        self.key.clear();
        self.value.clear();
    }

    /// Forward from `node`: settle on the first user key whose version at
    /// the horizon is a put.
    fn find_next_user_entry(&mut self, list: &SkipList, mut node: Option<usize>) {
        while let Some(i) = node {
            if list.sequence(i) > self.horizon {
                node = list.next(i);
                continue;
            }
            // Newest version at the horizon for this user key.
            if list.value_type(i) == ValueType::Delete {
                node = skip_user_key(list, i);
                continue;
            }
            self.load(list, i);
            return;
        }
        self.invalidate();
    }

    /// Backward from `bound` (exclusive; None = end): settle on the last
    /// user key whose version at the horizon is a put.
    fn find_prev_user_entry(&mut self, list: &SkipList, mut bound: Option<Vec<u8>>) {
        loop {
            let candidate = match &bound {
                Some(b) => list.find_less_than(b, MAX_SEQUENCE, ValueType::Put),
                None => list.find_last(),
            };
            let Some(i) = candidate else {
                self.invalidate();
                return;
            };
            let user_key = list.key(i).to_vec();
            if self.load_visible(list, &user_key) {
                return;
            }
            bound = Some(user_key);
        }
    }

    /// Position on `user_key` if its version at the horizon is a put.
    fn load_visible(&mut self, list: &SkipList, user_key: &[u8]) -> bool {
        match list.find_greater_or_equal(user_key, self.horizon, ValueType::Put) {
            Some(i)
                if list.comparator().compare(list.key(i), user_key) == Ordering::Equal
                    && list.value_type(i) == ValueType::Put =>
            {
                self.load(list, i);
                true
            }
            _ => false,
        }
    }

    fn load(&mut self, list: &SkipList, i: usize) {
        self.node = Some(i);
        self.key.clear();
        self.key.extend_from_slice(list.key(i));
        self.value.clear();
        self.value.extend_from_slice(list.value(i));
        self.valid = true;
    }
}

/// First node after every version of the user key at `i`.
fn skip_user_key(list: &SkipList, i: usize) -> Option<usize> {
    let cmp = list.comparator();
    let mut node = list.next(i);
    while let Some(n) = node {
        if cmp.compare(list.key(n), list.key(i)) != Ordering::Equal {
            break;
        }
        node = list.next(n);
    }
    node
}

impl StorageIterator for DbIterator {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.value
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn next(&mut self) -> Result<()> {
        self.check_open()?;
        let Some(i) = self.node.filter(|_| self.valid) else {
            return Ok(());
        };
        let mem = Arc::clone(&self.mem);
        let table = mem.read();
        let list = table.list();
        let start = skip_user_key(list, i);
        self.find_next_user_entry(list, start);
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.valid {
            return Ok(());
        }
        let mem = Arc::clone(&self.mem);
        let table = mem.read();
        let bound = std::mem::take(&mut self.key);
        self.find_prev_user_entry(table.list(), Some(bound));
        Ok(())
    }

    fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.check_open()?;
        let mem = Arc::clone(&self.mem);
        let table = mem.read();
        let list = table.list();
        let start = list.find_greater_or_equal(target, self.horizon, ValueType::Put);
        self.find_next_user_entry(list, start);
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.check_open()?;
        let mem = Arc::clone(&self.mem);
        let table = mem.read();
        let list = table.list();
        self.find_next_user_entry(list, list.first());
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<()> {
        self.check_open()?;
        let mem = Arc::clone(&self.mem);
        let table = mem.read();
        self.find_prev_user_entry(table.list(), None);
        Ok(())
    }
}
