//! intindex - a disk-backed B+Tree secondary index over integer attributes.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           intindex                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Index Layer (index/)                     │   │
//! │  │   BTreeIndex: open-or-create + bulk load, insert,        │   │
//! │  │   range scan cursor, node codec, splits                  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │   BufferPoolManager + Frame + guards + FIFO replacer     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Storage Layer (storage/)                  │   │
//! │  │   DiskManager + Page + PageHeader, heap relations        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, RecordId, Error, config)
//! - [`buffer`] - Buffer pool management
//! - [`storage`] - Disk I/O, page formats and heap files
//! - [`index`] - The B+Tree index
//!
//! # Quick Start
//! ```no_run
//! use intindex::{BTreeIndex, Datatype, HeapFile, IndexConfig, Operator};
//!
//! let mut heap = HeapFile::create("data", "orders", 32)?;
//! for amount in [250i32, 17, 990, 42] {
//!     heap.insert_record(&amount.to_le_bytes())?;
//! }
//!
//! // Index the i32 at byte offset 0 of every record ("orders.0").
//! let mut index = BTreeIndex::open_or_create(IndexConfig::new("data"), &heap, 0, Datatype::Integer)?;
//!
//! index.start_scan(0, Operator::Gte, 100, Operator::Lte)?;
//! let hits: Vec<_> = index.scan_iter().collect::<Result<_, _>>()?;
//! index.end_scan()?;
//! assert_eq!(hits.len(), 2);
//! # Ok::<(), intindex::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{IndexConfig, PAGE_SIZE};
pub use common::{Datatype, Error, Operator, PageId, RecordId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, StatsSnapshot};
pub use index::{BTreeIndex, ScanIter, ScanRange, TreeShape};
pub use storage::heap::{HeapFile, RecordScan, Relation};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
