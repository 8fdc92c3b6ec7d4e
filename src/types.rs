use std::cmp::Ordering;

use crate::comparator::Comparator;
use crate::error::{Error, Result};

/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// Stamp assigned to every committed operation.
pub type SequenceNumber = u64;

/// Largest sequence number a record may carry. Used as the "see everything"
/// horizon when seeking.
pub const MAX_SEQUENCE: SequenceNumber = u64::MAX >> 8;

/// Distinguishes puts from deletes in the storage engine.
/// A Delete writes a tombstone: the key stays, marked as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueType {
    /// A delete (tombstone marker).
    Delete = 0x00,
    /// A normal put operation.
    Put = 0x01,
}

impl ValueType {
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(ValueType::Delete),
            0x01 => Ok(ValueType::Put),
            _ => Err(Error::Corruption(format!("invalid value type: {byte}"))),
        }
    }
}

/// Compare two internal keys given as parts.
///
/// Ordering: (user_key ASC by the active comparator, sequence DESC, type DESC).
/// The newest version of a key always comes first, so a forward scan that
/// skips records above a horizon lands on the version visible at it.
pub fn compare_internal(
    cmp: &dyn Comparator,
    a_key: &[u8],
    a_seq: SequenceNumber,
    a_type: ValueType,
    b_key: &[u8],
    b_seq: SequenceNumber,
    b_type: ValueType,
) -> Ordering {
    cmp.compare(a_key, b_key)
        .then_with(|| b_seq.cmp(&a_seq))
        .then_with(|| b_type.cmp(&a_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;

    #[test]
    fn newer_sequence_sorts_first() {
        let cmp = BytewiseComparator;
        let ord = compare_internal(&cmp, b"k", 9, ValueType::Put, b"k", 3, ValueType::Put);
        assert_eq!(ord, Ordering::Less);
    }

    #[test]
    fn user_key_dominates_sequence() {
        let cmp = BytewiseComparator;
        let ord = compare_internal(&cmp, b"a", 1, ValueType::Put, b"b", 100, ValueType::Put);
        assert_eq!(ord, Ordering::Less);
    }

    #[test]
    fn value_type_round_trips_and_rejects_garbage() {
        assert_eq!(ValueType::from_u8(1).unwrap(), ValueType::Put);
        assert_eq!(ValueType::from_u8(0).unwrap(), ValueType::Delete);
        assert!(matches!(ValueType::from_u8(7), Err(Error::Corruption(_))));
    }
}
