pub mod reader;
pub mod record;
pub mod writer;

pub use reader::{WALIterator, WALReader};
pub use record::{encode_ops, WALRecord, MAX_PAYLOAD};
pub use writer::{list_logs, log_path, WALManager, WALWriter};
