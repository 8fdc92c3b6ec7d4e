//! Pluggable total order over user keys.
//!
//! The comparator's `name()` is written into the manifest when a store is
//! created and checked on every reopen, so a keyspace laid out under one
//! order is never read back under another.

use std::cmp::Ordering;

/// A strict total order over user keys.
///
/// Implementations must be pure functions of their arguments: the same two
/// keys always compare the same way, for the whole life of the store.
pub trait Comparator: Send + Sync {
    /// Three-way comparison of two user keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Identity persisted at creation. Changing the order means changing
    /// the name.
    fn name(&self) -> &str;

    /// If `start < limit`, may shorten `start` to any key in `[start, limit)`.
    /// A hint only; the default leaves `start` unchanged.
    fn find_shortest_separator(&self, _start: &mut Vec<u8>, _limit: &[u8]) {}

    /// May change `key` to any key `>= key`. The default is a no-op.
    fn find_short_successor(&self, _key: &mut Vec<u8>) {}
}

/// Lexicographic byte order. The default comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        "kvlite.BytewiseComparator"
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let min_len = start.len().min(limit.len());
        let diff = start
            .iter()
            .zip(limit)
            .position(|(a, b)| a != b)
            .unwrap_or(min_len);

        if diff >= min_len {
            // One is a prefix of the other.
            return;
        }

        let byte = start[diff];
        if byte < 0xff && byte + 1 < limit[diff] {
            start[diff] = byte + 1;
            start.truncate(diff + 1);
            debug_assert_eq!(self.compare(start, limit), Ordering::Less);
        }
    }

    fn find_short_successor(&self, key: &mut Vec<u8>) {
        if let Some(i) = key.iter().position(|&b| b != 0xff) {
            key[i] += 1;
            key.truncate(i + 1);
        }
        // All 0xff: leave as is.
    }
}
