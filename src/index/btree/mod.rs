//! Disk-backed B+Tree over `i32` keys.
//!
//! # Components
//! - [`node`] - Leaf and internal page layouts, decoded into [`LeafNode`] and
//!   [`InternalNode`]
//! - `meta` - The metadata page (attribute descriptor and root pointer)
//! - `navigator` - Recursive insert and root-to-leaf search
//! - `split` - Leaf and internal node splits
//! - `scan` - The range scan cursor
//! - [`BTreeIndex`] - Lifecycle, insertion, scans and inspection

mod meta;
mod navigator;
pub mod node;
mod scan;
mod split;
mod tree;

pub use node::{InternalNode, LeafEntry, LeafNode};
pub use scan::ScanRange;
pub use tree::{BTreeIndex, ScanIter, TreeShape};
