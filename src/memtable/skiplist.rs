use std::cmp::Ordering;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::comparator::Comparator;
use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::types::{compare_internal, SequenceNumber, ValueType, MAX_SEQUENCE};

/// Maximum height of the skip list. LevelDB uses 12.
pub const MAX_HEIGHT: usize = 12;

/// Each level is promoted with probability 1/BRANCHING.
const BRANCHING: u32 = 4;

/// Arena index of the head sentinel.
const HEAD: usize = 0;

/// Per-node bookkeeping beyond key and value bytes.
const NODE_OVERHEAD: usize = 8 + 1;

/// A single node in the skip list.
///
/// Each node has `height` forward pointers. Level 0 contains all nodes
/// (a regular linked list). Higher levels skip over nodes, enabling
/// O(log n) average-case search.
///
/// ```text
/// Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
/// Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
/// Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
/// Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
/// ```
///
/// Nodes live in an arena and link by index. The arena only grows, so an
/// index handed out stays valid for the life of the list.
struct SkipNode {
    key: Vec<u8>,
    sequence: SequenceNumber,
    value_type: ValueType,
    value: Vec<u8>,
    forward: Vec<Option<usize>>,
}

/// A probabilistic sorted list of internal records.
///
/// Ordered by (user key per comparator, sequence DESC, type DESC). Several
/// versions of one user key sit next to each other, newest first.
pub struct SkipList {
    nodes: Vec<SkipNode>,
    height: usize,
    len: usize,
    size_bytes: usize,
    cmp: Arc<dyn Comparator>,
    rng: StdRng,
}

impl SkipList {
    /// Create a new empty skip list ordered by `cmp`.
    pub fn new(cmp: Arc<dyn Comparator>) -> Self {
        let head = SkipNode {
            key: Vec::new(),
            sequence: 0,
            value_type: ValueType::Delete,
            value: Vec::new(),
            forward: vec![None; MAX_HEIGHT],
        };
        SkipList {
            nodes: vec![head],
            height: 1,
            len: 0,
            size_bytes: 0,
            cmp,
            rng: StdRng::seed_from_u64(0xdead_beef),
        }
    }

    /// Insert a record. Returns false if an identical internal key is
    /// already present (log replay may offer the same record twice).
    pub fn insert(
        &mut self,
        key: Vec<u8>,
        sequence: SequenceNumber,
        value_type: ValueType,
        value: Vec<u8>,
    ) -> bool {
        let mut prev = [HEAD; MAX_HEIGHT];
        let mut x = HEAD;
        for level in (0..self.height).rev() {
            while let Some(next) = self.nodes[x].forward[level] {
                if self.compare_node(next, &key, sequence, value_type) == Ordering::Less {
                    x = next;
                } else {
                    break;
                }
            }
            prev[level] = x;
        }

        if let Some(next) = self.nodes[x].forward[0] {
            if self.compare_node(next, &key, sequence, value_type) == Ordering::Equal {
                return false;
            }
        }

        let height = self.random_height();
        if height > self.height {
            // prev[] for the new levels already points at HEAD.
            self.height = height;
        }

        let idx = self.nodes.len();
        self.size_bytes += key.len() + value.len() + NODE_OVERHEAD + height * 8;
        let mut node = SkipNode {
            key,
            sequence,
            value_type,
            value,
            forward: vec![None; height],
        };
        for (level, slot) in node.forward.iter_mut().enumerate() {
            *slot = self.nodes[prev[level]].forward[level];
        }
        self.nodes.push(node);
        for (level, &p) in prev.iter().enumerate().take(height) {
            self.nodes[p].forward[level] = Some(idx);
        }
        self.len += 1;
        true
    }

    /// Number of records in the skip list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the skip list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Approximate memory usage in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn comparator(&self) -> &Arc<dyn Comparator> {
        &self.cmp
    }

    /// Create an iterator over all records in sorted order.
    pub fn iter(&self) -> SkipListIterator<'_> {
        SkipListIterator {
            list: self,
            current: self.first(),
        }
    }

    // Index-level navigation, used by the engine iterator which cannot hold
    // a borrow across calls.

    pub(crate) fn first(&self) -> Option<usize> {
        self.nodes[HEAD].forward[0]
    }

    pub(crate) fn next(&self, idx: usize) -> Option<usize> {
        self.nodes[idx].forward[0]
    }

    /// First node at or after the internal key.
    pub(crate) fn find_greater_or_equal(
        &self,
        key: &[u8],
        sequence: SequenceNumber,
        value_type: ValueType,
    ) -> Option<usize> {
        let mut x = HEAD;
        for level in (0..self.height).rev() {
            while let Some(next) = self.nodes[x].forward[level] {
                if self.compare_node(next, key, sequence, value_type) == Ordering::Less {
                    x = next;
                } else {
                    break;
                }
            }
        }
        self.nodes[x].forward[0]
    }

    /// Last node strictly before the internal key.
    pub(crate) fn find_less_than(
        &self,
        key: &[u8],
        sequence: SequenceNumber,
        value_type: ValueType,
    ) -> Option<usize> {
        let mut x = HEAD;
        for level in (0..self.height).rev() {
            while let Some(next) = self.nodes[x].forward[level] {
                if self.compare_node(next, key, sequence, value_type) == Ordering::Less {
                    x = next;
                } else {
                    break;
                }
            }
        }
        (x != HEAD).then_some(x)
    }

    pub(crate) fn find_last(&self) -> Option<usize> {
        let mut x = HEAD;
        for level in (0..self.height).rev() {
            while let Some(next) = self.nodes[x].forward[level] {
                x = next;
            }
        }
        (x != HEAD).then_some(x)
    }

    pub(crate) fn key(&self, idx: usize) -> &[u8] {
        &self.nodes[idx].key
    }

    pub(crate) fn value(&self, idx: usize) -> &[u8] {
        &self.nodes[idx].value
    }

    pub(crate) fn sequence(&self, idx: usize) -> SequenceNumber {
        self.nodes[idx].sequence
    }

    pub(crate) fn value_type(&self, idx: usize) -> ValueType {
        self.nodes[idx].value_type
    }

    fn compare_node(
        &self,
        idx: usize,
        key: &[u8],
        sequence: SequenceNumber,
        value_type: ValueType,
    ) -> Ordering {
        let node = &self.nodes[idx];
        compare_internal(
            self.cmp.as_ref(),
            &node.key,
            node.sequence,
            node.value_type,
            key,
            sequence,
            value_type,
        )
    }

    /// Generate a random level for a new node.
    /// Each level has a 1/4 probability (LevelDB uses 1/4, not 1/2).
    fn random_height(&mut self) -> usize {
        let mut height = 1;
        while height < MAX_HEIGHT && self.rng.gen_ratio(1, BRANCHING) {
            height += 1;
        }
        height
    }
}

/// Iterator over skip list records in sorted order.
///
/// Borrows the list, so the list cannot change underneath it. `key()` is
/// the user key; `sequence()` and `value_type()` expose the rest of the
/// internal key.
pub struct SkipListIterator<'a> {
    list: &'a SkipList,
    current: Option<usize>,
}

impl<'a> SkipListIterator<'a> {
    pub fn sequence(&self) -> SequenceNumber {
        self.current.map_or(0, |i| self.list.sequence(i))
    }

    pub fn value_type(&self) -> ValueType {
        self.current
            .map_or(ValueType::Delete, |i| self.list.value_type(i))
    }
}

impl<'a> StorageIterator for SkipListIterator<'a> {
    fn key(&self) -> &[u8] {
        self.current.map_or(&[][..], |i| self.list.key(i))
    }

    fn value(&self) -> &[u8] {
        self.current.map_or(&[][..], |i| self.list.value(i))
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> Result<()> {
        if let Some(i) = self.current {
            self.current = self.list.next(i);
        }
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        if let Some(i) = self.current {
            let (key, seq, vt) = (self.list.key(i), self.list.sequence(i), self.list.value_type(i));
            self.current = self.list.find_less_than(key, seq, vt);
        }
        Ok(())
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.current = self
            .list
            .find_greater_or_equal(key, MAX_SEQUENCE, ValueType::Put);
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.current = self.list.first();
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<()> {
        self.current = self.list.find_last();
        Ok(())
    }
}
