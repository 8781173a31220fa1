//! Error types for intindex.

use crate::common::{Datatype, Operator, RecordId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in intindex.
///
/// Storage failures and index misuse share one enum so every public
/// operation can return [`Result`]. Reaching the end of a scan or of a
/// bulk-load source is not an error; those surface as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// Attempted to unpin a page that wasn't pinned.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("Page {0} is not pinned")]
    PageNotPinned(u32),

    /// Stored CRC32 does not match the page contents read from disk.
    #[error("Checksum mismatch on page {0}")]
    ChecksumMismatch(u32),

    /// A page decoded to something that breaks the node layout.
    #[error("Corrupt page {page}: {reason}")]
    Corrupt { page: u32, reason: &'static str },

    /// File is missing the superblock or was written with another page size.
    #[error("Not an intindex file: {0}")]
    BadFileFormat(String),

    /// Record does not fit in a single heap page.
    #[error("Record of {0} bytes does not fit in a page")]
    RecordTooLarge(usize),

    /// Heap slot does not exist.
    #[error("Record {0} not found")]
    RecordNotFound(RecordId),

    /// Existing index file was built for another relation, offset or type.
    #[error("Index {0} does not match the requested relation, attribute offset or type")]
    BadIndexInfo(String),

    /// Low operator must be `Gt`/`Gte` and high operator `Lt`/`Lte`.
    #[error("Bad scan operators: low {low:?}, high {high:?}")]
    BadOpcodes { low: Operator, high: Operator },

    /// Low bound of a scan is greater than the high bound.
    #[error("Bad scan range: low {low} > high {high}")]
    BadScanRange { low: i32, high: i32 },

    /// The leaf located for the low bound holds no key inside the range.
    #[error("No key satisfies the scan criteria")]
    NoSuchKeyFound,

    /// `scan_next` or `end_scan` called without an active scan.
    #[error("Scan has not been initialized")]
    ScanNotInitialized,

    /// Only integer attributes can be indexed.
    #[error("Attribute type {0:?} cannot be indexed")]
    UnsupportedAttrType(Datatype),

    /// Relation names are stored in a fixed 20-byte field.
    #[error("Invalid relation name {0:?}")]
    InvalidRelationName(String),

    /// Record is too short to contain the indexed attribute.
    #[error("Record {rid} has {len} bytes, attribute at offset {offset} does not fit")]
    AttributeOutOfBounds {
        rid: RecordId,
        offset: usize,
        len: usize,
    },

    /// Rejected [`IndexConfig`](crate::IndexConfig).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
