pub mod db_iter;

pub use db_iter::DbIterator;

use crate::error::Result;

/// The central iteration abstraction for the storage engine.
///
/// Every sorted data source (skip list, engine view) implements this trait.
/// `key()`/`value()` borrow from the iterator, so a caller cannot hold them
/// across a move or past the iterator's drop; copy out with `to_vec()`.
pub trait StorageIterator {
    /// Returns the current key. Only meaningful when is_valid() is true.
    fn key(&self) -> &[u8];

    /// Returns the current value. Only meaningful when is_valid() is true.
    fn value(&self) -> &[u8];

    /// Returns true if the iterator is positioned at a valid entry.
    fn is_valid(&self) -> bool;

    /// Advances to the next entry.
    fn next(&mut self) -> Result<()>;

    /// Steps back to the previous entry.
    fn prev(&mut self) -> Result<()>;

    /// Positions the iterator at the first entry with key >= target.
    fn seek(&mut self, key: &[u8]) -> Result<()>;

    /// Positions the iterator at the first entry.
    fn seek_to_first(&mut self) -> Result<()>;

    /// Positions the iterator at the last entry.
    fn seek_to_last(&mut self) -> Result<()>;
}
