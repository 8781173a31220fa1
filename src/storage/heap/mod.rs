//! Heap relations: the tables an index is built over.
//!
//! The index only needs a sequential cursor over `(RecordId, bytes)` pairs,
//! described by [`RecordScan`], and a way to name and open such a cursor,
//! described by [`Relation`]. [`HeapFile`] is the on-disk implementation;
//! tests are free to supply their own.

mod heap_file;
mod heap_page;

pub use heap_file::{FileScan, HeapFile};
pub use heap_page::MAX_RECORD_SIZE;

use crate::common::{RecordId, Result};

/// Sequential cursor over the tuples of a relation.
pub trait RecordScan {
    /// Advance to the next tuple. `Ok(None)` means the relation is exhausted;
    /// it is the normal end of a scan, not an error.
    fn scan_next(&mut self) -> Result<Option<RecordId>>;

    /// Bytes of the tuple the cursor is positioned on.
    fn record(&self) -> Result<&[u8]>;
}

/// A named relation that can be scanned from the start.
pub trait Relation {
    fn name(&self) -> &str;

    fn scan(&self) -> Result<Box<dyn RecordScan + '_>>;
}
