use crate::types::{Key, Value, ValueType};

/// Bytes of fixed header every encoded batch carries: sequence + count.
pub const BATCH_HEADER_SIZE: usize = 8 + 4;

/// One pending operation in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOp {
    pub value_type: ValueType,
    pub key: Key,
    pub value: Value,
}

impl BatchOp {
    /// Bytes this op occupies inside an encoded batch.
    pub fn encoded_size(&self) -> usize {
        match self.value_type {
            ValueType::Put => 1 + 4 + self.key.len() + 4 + self.value.len(),
            ValueType::Delete => 1 + 4 + self.key.len(),
        }
    }
}

/// Receives a batch's operations in order. See `WriteBatch::iterate`.
pub trait BatchHandler {
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// An ordered group of puts and deletes committed atomically.
///
/// Sequence numbers are assigned at commit: the batch gets one contiguous
/// block, one per operation, in insertion order. A later operation on the
/// same key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    size: usize,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> &mut Self {
        self.push(BatchOp {
            value_type: ValueType::Put,
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
        })
    }

    pub fn delete(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        self.push(BatchOp {
            value_type: ValueType::Delete,
            key: key.as_ref().to_vec(),
            value: Vec::new(),
        })
    }

    /// Append all of `other`'s operations after this batch's.
    pub fn append(&mut self, other: &WriteBatch) -> &mut Self {
        for op in &other.ops {
            self.push(op.clone());
        }
        self
    }

    pub fn clear(&mut self) {
        self.ops.clear();
        self.size = 0;
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Size of the batch once encoded into a log record payload.
    pub fn approximate_size(&self) -> usize {
        BATCH_HEADER_SIZE + self.size
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Replay operations, in order, into `handler`.
    pub fn iterate(&self, handler: &mut impl BatchHandler) {
        for op in &self.ops {
            match op.value_type {
                ValueType::Put => handler.put(&op.key, &op.value),
                ValueType::Delete => handler.delete(&op.key),
            }
        }
    }

    pub(crate) fn from_ops(ops: Vec<BatchOp>) -> Self {
        let size = ops.iter().map(BatchOp::encoded_size).sum();
        WriteBatch { ops, size }
    }

    fn push(&mut self, op: BatchOp) -> &mut Self {
        self.size += op.encoded_size();
        self.ops.push(op);
        self
    }
}
