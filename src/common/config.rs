//! Configuration for intindex.
//!
//! Compile-time constants describe the on-disk format. [`IndexConfig`] holds
//! the knobs chosen when an index is opened or created.

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::index::btree::node::{InternalNode, LeafNode};

/// Size of a page in bytes (4KB).
///
/// Every file (index or heap relation) is a sequence of pages of this size.
/// Page 0 of each file is the superblock.
pub const PAGE_SIZE: usize = 4096;

/// Frames in the buffer pool when the caller does not choose a size.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Bytes reserved for the relation name in the metadata page, including the
/// NUL terminator.
pub const RELATION_NAME_LEN: usize = 20;

/// Smallest node capacity that still lets every split case produce two
/// non-empty nodes.
pub const MIN_NODE_CAPACITY: usize = 2;

/// Runtime configuration for a [`BTreeIndex`](crate::index::BTreeIndex).
///
/// The node capacities only matter when the index file is created; an
/// existing index is reopened with the capacities stored in its metadata
/// page.
///
/// # Example
/// ```
/// use intindex::IndexConfig;
///
/// let config = IndexConfig::new("/tmp/db")
///     .with_pool_size(16)
///     .with_leaf_capacity(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Directory holding the index file.
    pub directory: PathBuf,
    /// Number of buffer pool frames dedicated to the index file.
    pub pool_size: usize,
    /// Maximum (key, record id) entries per leaf.
    pub leaf_capacity: usize,
    /// Maximum separator keys per internal node.
    pub internal_capacity: usize,
}

impl IndexConfig {
    /// Configuration with the default pool size and the largest node
    /// capacities a page can hold.
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            pool_size: DEFAULT_POOL_SIZE,
            leaf_capacity: LeafNode::MAX_CAPACITY,
            internal_capacity: InternalNode::MAX_CAPACITY,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = capacity;
        self
    }

    pub fn with_internal_capacity(mut self, capacity: usize) -> Self {
        self.internal_capacity = capacity;
        self
    }

    /// Check that the pool is usable and both capacities fit in a page.
    pub fn validate(&self) -> Result<()> {
        // An insert pins the whole root-to-leaf path plus a freshly split
        // sibling and the metadata page.
        if self.pool_size < 4 {
            return Err(Error::InvalidConfig(format!(
                "pool_size must be at least 4, got {}",
                self.pool_size
            )));
        }
        check_capacity("leaf_capacity", self.leaf_capacity, LeafNode::MAX_CAPACITY)?;
        check_capacity(
            "internal_capacity",
            self.internal_capacity,
            InternalNode::MAX_CAPACITY,
        )
    }
}

fn check_capacity(name: &str, value: usize, max: usize) -> Result<()> {
    if !(MIN_NODE_CAPACITY..=max).contains(&value) {
        return Err(Error::InvalidConfig(format!(
            "{name} must be in {MIN_NODE_CAPACITY}..={max}, got {value}"
        )));
    }
    Ok(())
}
