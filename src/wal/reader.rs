use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::wal::record::WALRecord;

/// Reads WAL records from a file for crash recovery.
///
/// Loads the entire file into memory, then iterates record by record.
pub struct WALReader {
    data: Vec<u8>,
}

impl WALReader {
    /// Open a WAL file for reading.
    pub fn new(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(WALReader { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Create an iterator over the records in the WAL.
    pub fn iter(&self) -> WALIterator<'_> {
        WALIterator {
            data: &self.data,
            offset: 0,
            torn_tail: false,
            failed: false,
        }
    }
}

/// Iterator over WAL records.
///
/// A frame whose header is incomplete, or whose checked header promises
/// more bytes than the file holds, is a partial append from a crash: the
/// iterator stops there and reports `torn_tail()`. Nothing was acknowledged
/// for that batch, so it resolves to "not applied". A complete frame that
/// fails its checksum is yielded as `Err(Corruption)` and ends iteration.
pub struct WALIterator<'a> {
    data: &'a [u8],
    offset: usize,
    torn_tail: bool,
    failed: bool,
}

impl<'a> WALIterator<'a> {
    /// Bytes covered by the records yielded so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether iteration stopped at an incomplete trailing frame.
    pub fn torn_tail(&self) -> bool {
        self.torn_tail
    }
}

impl<'a> Iterator for WALIterator<'a> {
    type Item = Result<WALRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.torn_tail || self.offset >= self.data.len() {
            return None;
        }

        match WALRecord::decode(&self.data[self.offset..]) {
            Ok(record) => {
                self.offset += record.encoded_size();
                Some(Ok(record))
            }
            Err(Error::Eof) => {
                self.torn_tail = true;
                None
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
