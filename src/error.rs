use std::io;
use std::path::PathBuf;

/// Unified error type for the storage engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store (or a file it needs) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Another live handle holds the directory lock.
    #[error("Lock {}: already held", .0.display())]
    AlreadyLocked(PathBuf),
    /// The store was created with a different comparator.
    #[error("Comparator mismatch: store uses {expected}, open supplied {found}")]
    ComparatorMismatch { expected: String, found: String },
    /// Data corruption detected (CRC mismatch, bad format, etc).
    #[error("Corruption: {0}")]
    Corruption(String),
    /// IO error from disk operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Snapshot was already released or belongs to another handle.
    #[error("Invalid snapshot")]
    InvalidSnapshot,
    /// The handle that produced this resource has been closed.
    #[error("Use after close")]
    UseAfterClose,
    /// Malformed options or arguments.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Unexpected end of file/data.
    #[error("Unexpected end of file")]
    Eof,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Corruption(format!("manifest: {e}"))
    }
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
