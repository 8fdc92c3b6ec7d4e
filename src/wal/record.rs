use crate::batch::{BatchOp, WriteBatch, BATCH_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::types::{SequenceNumber, ValueType};

/// One committed batch as stored in the WAL.
///
/// On-disk format:
/// ```text
/// ┌──────────┬─────────┬─────────────┬──────────┬───────────┬───────────────────┐
/// │ CRC (4B) │ Len (4B)│ Len CRC (4B)│ Seq (8B) │ Count (4B)│ ops (Count times) │
/// └──────────┴─────────┴─────────────┴──────────┴───────────┴───────────────────┘
/// op: Type (1B) │ Key Len (4B) │ Key │ [Val Len (4B) │ Val]   (value for Put only)
/// ```
///
/// CRC covers everything after the CRC field itself. Len CRC covers the
/// four length bytes alone, so a damaged length is caught before it is
/// trusted to find the end of the frame. `Seq` is the sequence number of
/// the first op; op i gets `Seq + i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WALRecord {
    pub sequence: SequenceNumber,
    pub batch: WriteBatch,
}

// Header sizes
const CRC_SIZE: usize = 4;
const LEN_SIZE: usize = 4;
const LEN_CRC_SIZE: usize = 4;
const HEADER_SIZE: usize = CRC_SIZE + LEN_SIZE + LEN_CRC_SIZE;

/// Largest payload (sequence, count and ops) a single record may carry.
pub const MAX_PAYLOAD: usize = 1 << 30;

impl WALRecord {
    pub fn new(sequence: SequenceNumber, batch: WriteBatch) -> Self {
        WALRecord { sequence, batch }
    }

    /// Serialize this record to bytes (including CRC header).
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_ops(self.sequence, self.batch.ops())
    }

    /// Deserialize one record from the front of `data`.
    ///
    /// `Error::Eof` means the frame runs past the end of `data` (a torn
    /// write): either the header itself is incomplete, or the header checks
    /// out and the payload is short. `Error::Corruption` means the header or
    /// the complete frame is invalid.
    pub fn decode(data: &[u8]) -> Result<Self> {
        decode_with_limit(data, MAX_PAYLOAD)
    }

    /// Size of this record when serialized on disk.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.batch.approximate_size()
    }

    /// Sequence number of the last op in the record.
    pub fn last_sequence(&self) -> SequenceNumber {
        self.sequence + (self.batch.len() as u64).saturating_sub(1)
    }
}

/// Encode `ops` as one framed record starting at `sequence`, without
/// building a `WriteBatch` first. A payload over `MAX_PAYLOAD` is
/// `InvalidArgument`: it could never be read back.
pub fn encode_ops(sequence: SequenceNumber, ops: &[BatchOp]) -> Result<Vec<u8>> {
    encode_with_limit(sequence, ops, MAX_PAYLOAD)
}

fn encode_with_limit(sequence: SequenceNumber, ops: &[BatchOp], limit: usize) -> Result<Vec<u8>> {
    let payload_len = BATCH_HEADER_SIZE + ops.iter().map(BatchOp::encoded_size).sum::<usize>();
    if payload_len > limit {
        return Err(Error::InvalidArgument(format!(
            "batch of {payload_len} bytes exceeds the {limit} byte record limit"
        )));
    }
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload_len);

    // Reserve space for CRC (we'll fill it at the end)
    buf.extend_from_slice(&[0u8; CRC_SIZE]);
    let len_bytes = to_u32(payload_len)?.to_le_bytes();
    buf.extend_from_slice(&len_bytes);
    buf.extend_from_slice(&crc32fast::hash(&len_bytes).to_le_bytes());
    buf.extend_from_slice(&sequence.to_le_bytes());
    buf.extend_from_slice(&to_u32(ops.len())?.to_le_bytes());

    for op in ops {
        buf.push(op.value_type as u8);
        buf.extend_from_slice(&to_u32(op.key.len())?.to_le_bytes());
        buf.extend_from_slice(&op.key);
        if op.value_type == ValueType::Put {
            buf.extend_from_slice(&to_u32(op.value.len())?.to_le_bytes());
            buf.extend_from_slice(&op.value);
        }
    }

    let crc = crc32fast::hash(&buf[CRC_SIZE..]);
    buf[0..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

fn decode_with_limit(data: &[u8], limit: usize) -> Result<WALRecord> {
    if data.len() < HEADER_SIZE {
        return Err(Error::Eof);
    }

    let stored_crc = read_u32(data, 0)?;
    let len_bytes = &data[CRC_SIZE..CRC_SIZE + LEN_SIZE];
    if read_u32(data, CRC_SIZE + LEN_SIZE)? != crc32fast::hash(len_bytes) {
        return Err(Error::Corruption("length checksum mismatch".into()));
    }

    let payload_len = read_u32(data, CRC_SIZE)? as usize;
    if !(BATCH_HEADER_SIZE..=limit).contains(&payload_len) {
        return Err(Error::Corruption(format!(
            "invalid record length: {payload_len}"
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if data.len() < total_len {
        return Err(Error::Eof);
    }

    let computed_crc = crc32fast::hash(&data[CRC_SIZE..total_len]);
    if stored_crc != computed_crc {
        return Err(Error::Corruption("CRC mismatch".into()));
    }

    let payload = &data[HEADER_SIZE..total_len];
    let sequence = read_u64(payload, 0)?;
    let count = read_u32(payload, 8)? as usize;

    let mut offset = BATCH_HEADER_SIZE;
    let mut ops = Vec::with_capacity(count.min(payload.len()));
    for _ in 0..count {
        let value_type = ValueType::from_u8(*payload.get(offset).ok_or_else(short)?)?;
        offset += 1;
        let key = read_bytes(payload, &mut offset)?;
        let value = match value_type {
            ValueType::Put => read_bytes(payload, &mut offset)?,
            ValueType::Delete => Vec::new(),
        };
        ops.push(BatchOp {
            value_type,
            key,
            value,
        });
    }
    if offset != payload.len() {
        return Err(Error::Corruption("trailing bytes in record".into()));
    }

    Ok(WALRecord {
        sequence,
        batch: WriteBatch::from_ops(ops),
    })
}

fn to_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::InvalidArgument(format!("length {len} exceeds u32")))
}

fn short() -> Error {
    Error::Corruption("op extends past record".into())
}

fn read_u32(data: &[u8], at: usize) -> Result<u32> {
    let bytes = data.get(at..at + 4).ok_or_else(short)?;
    let mut arr = [0u8; 4];
    arr.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(arr))
}

fn read_u64(data: &[u8], at: usize) -> Result<u64> {
    let bytes = data.get(at..at + 8).ok_or_else(short)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(arr))
}

fn read_bytes(data: &[u8], offset: &mut usize) -> Result<Vec<u8>> {
    let len = read_u32(data, *offset)? as usize;
    *offset += 4;
    let bytes = data.get(*offset..*offset + len).ok_or_else(short)?;
    *offset += len;
    Ok(bytes.to_vec())
}
