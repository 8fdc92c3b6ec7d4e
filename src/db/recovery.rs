use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::memtable::MemTable;
use crate::types::SequenceNumber;
use crate::wal::{list_logs, WALManager, WALReader, WALRecord};

/// State rebuilt from the logs at open.
pub(crate) struct Recovered {
    pub mem: MemTable,
    pub last_sequence: SequenceNumber,
    /// Log new writes append to.
    pub log_number: u64,
    pub records: usize,
}

/// Replay every live log in `dir` into a fresh memtable.
///
/// Logs numbered below the manifest's `log_number` are leftovers of an
/// interrupted rotation and are deleted. A torn tail is cut off; any other
/// invalid record fails the open with `Corruption`.
pub(crate) fn recover(dir: &Path, manifest: &Manifest, cmp: Arc<dyn Comparator>) -> Result<Recovered> {
    let mut mem = MemTable::new(cmp);
    let mut last_sequence = manifest.last_sequence;
    let mut log_number = manifest.log_number;
    let mut records = 0;

    for (number, path) in list_logs(dir)? {
        if number < manifest.log_number {
            info!(path = %path.display(), "removing obsolete log");
            WALManager::delete_log(&path)?;
            continue;
        }

        let reader = WALReader::new(&path)?;
        let mut iter = reader.iter();
        for record in iter.by_ref() {
            let record = record.map_err(|e| match e {
                Error::Corruption(msg) => {
                    Error::Corruption(format!("{}: {msg}", path.display()))
                }
                other => other,
            })?;
            if record.batch.is_empty() {
                continue;
            }
            apply(&mut mem, &record);
            last_sequence = last_sequence.max(record.last_sequence());
            records += 1;
        }

        if iter.torn_tail() {
            let valid = iter.offset() as u64;
            warn!(
                path = %path.display(),
                dropped = reader.len() as u64 - valid,
                "dropping incomplete record at log tail"
            );
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(valid)?;
            file.sync_all()?;
        }
        log_number = number;
    }

    Ok(Recovered {
        mem,
        last_sequence,
        log_number,
        records,
    })
}

/// Insert a record's ops at their sequence numbers.
pub(crate) fn apply(mem: &mut MemTable, record: &WALRecord) {
    for (i, op) in record.batch.ops().iter().enumerate() {
        mem.add(record.sequence + i as u64, op.value_type, &op.key, &op.value);
    }
}
