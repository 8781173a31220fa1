//! The B+Tree index object.

use std::fs;

use crate::buffer::BufferPoolManager;
use crate::common::config::IndexConfig;
use crate::common::{Datatype, Error, Operator, PageId, RecordId, Result};
use crate::storage::heap::Relation;
use crate::storage::DiskManager;

use super::meta::{IndexMeta, META_PAGE_ID};
use super::navigator::Navigator;
use super::node::{InternalNode, LeafNode};
use super::scan::{ScanCursor, ScanRange};

/// Summary returned by [`BTreeIndex::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeShape {
    /// Levels including the leaves. A fresh index has height 2.
    pub height: usize,
    pub internal_count: usize,
    pub leaf_count: usize,
    pub entry_count: usize,
}

/// Secondary index over one `i32` attribute of a relation.
///
/// The index lives in its own file named `"<relation>.<offset>"` inside
/// [`IndexConfig::directory`]:
///
/// ```text
/// page 0   superblock
/// page 1   metadata (descriptor, root page id, node capacities)
/// page 2.. internal and leaf nodes
/// ```
///
/// The root is always an internal node; a fresh index is a root with one
/// empty leaf below it. Leaves are chained left to right for range scans.
///
/// One range scan can be active at a time. Starting another scan ends the
/// running one.
///
/// # Example
/// ```no_run
/// use intindex::{BTreeIndex, Datatype, HeapFile, IndexConfig, Operator};
///
/// let mut heap = HeapFile::create("/tmp/db", "emp", 16)?;
/// for id in 0..100i32 {
///     heap.insert_record(&id.to_le_bytes())?;
/// }
///
/// let config = IndexConfig::new("/tmp/db");
/// let mut index = BTreeIndex::open_or_create(config, &heap, 0, Datatype::Integer)?;
///
/// index.start_scan(10, Operator::Gte, 20, Operator::Lt)?;
/// while let Some(rid) = index.scan_next()? {
///     println!("{rid}");
/// }
/// index.end_scan()?;
/// # Ok::<(), intindex::Error>(())
/// ```
pub struct BTreeIndex {
    name: String,
    meta: IndexMeta,
    /// Level of the root node, cached so `height` needs no page access.
    root_level: u16,
    bpm: BufferPoolManager,
    cursor: ScanCursor,
}

impl BTreeIndex {
    /// Open the index for `relation`'s attribute at `attr_byte_offset`,
    /// building it from the relation if the file does not exist yet.
    ///
    /// # Errors
    /// - `Error::UnsupportedAttrType` unless `attr_type` is `Integer`
    /// - `Error::BadIndexInfo` if an existing file describes another
    ///   relation, offset or type
    /// - `Error::InvalidRelationName` if the name does not fit the
    ///   metadata page
    /// - `Error::AttributeOutOfBounds` if a record is too short during the
    ///   bulk load; the half-built file is removed
    pub fn open_or_create<R>(
        config: IndexConfig,
        relation: &R,
        attr_byte_offset: u32,
        attr_type: Datatype,
    ) -> Result<Self>
    where
        R: Relation + ?Sized,
    {
        config.validate()?;
        if attr_type != Datatype::Integer {
            return Err(Error::UnsupportedAttrType(attr_type));
        }

        let name = format!("{}.{}", relation.name(), attr_byte_offset);
        let path = config.directory.join(&name);
        if path.exists() {
            return Self::open(config, name, relation.name(), attr_byte_offset, attr_type);
        }

        let meta = IndexMeta::new(
            relation.name(),
            attr_byte_offset,
            attr_type,
            config.leaf_capacity,
            config.internal_capacity,
        )?;
        let mut index = Self::create(config, name, meta)?;
        match index.bulk_load(relation) {
            Ok(()) => Ok(index),
            Err(e) => {
                drop(index);
                if let Err(remove_err) = fs::remove_file(&path) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %remove_err,
                        "failed to remove partial index"
                    );
                }
                Err(e)
            }
        }
    }

    fn open(
        config: IndexConfig,
        name: String,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: Datatype,
    ) -> Result<Self> {
        let dm = DiskManager::open(config.directory.join(&name))?;
        let bpm = BufferPoolManager::new(config.pool_size, dm);

        let meta = {
            let guard = bpm.fetch_page_read(META_PAGE_ID)?;
            IndexMeta::decode(&guard)?
        };
        if !meta.describes(relation_name, attr_byte_offset, attr_type) {
            return Err(Error::BadIndexInfo(name));
        }
        let root_level = Navigator::new(&bpm, meta.leaf_capacity, meta.internal_capacity)
            .read_internal(meta.root_page_id)?
            .level;

        tracing::debug!(
            index = %name,
            root = %meta.root_page_id,
            leaf_capacity = meta.leaf_capacity,
            internal_capacity = meta.internal_capacity,
            "opened index"
        );
        Ok(Self {
            name,
            meta,
            root_level,
            bpm,
            cursor: ScanCursor::default(),
        })
    }

    fn create(config: IndexConfig, name: String, mut meta: IndexMeta) -> Result<Self> {
        let dm = DiskManager::create(config.directory.join(&name))?;
        let bpm = BufferPoolManager::new(config.pool_size, dm);

        let meta_page_id = bpm.new_page()?.page_id();
        if meta_page_id != META_PAGE_ID {
            return Err(Error::Corrupt {
                page: meta_page_id.0,
                reason: "metadata page must follow the superblock",
            });
        }

        let root_page_id = {
            let mut root = bpm.new_page()?;
            let mut leaf = bpm.new_page()?;
            LeafNode::new().encode(&mut leaf, meta.leaf_capacity);
            InternalNode::with_child(1, leaf.page_id()).encode(&mut root, meta.internal_capacity);
            root.page_id()
        };
        meta.root_page_id = root_page_id;

        let index = Self {
            name,
            meta,
            root_level: 1,
            bpm,
            cursor: ScanCursor::default(),
        };
        index.write_meta()?;

        tracing::debug!(index = %index.name, root = %root_page_id, "created index");
        Ok(index)
    }

    /// Insert every tuple of `relation`, then flush.
    fn bulk_load<R>(&mut self, relation: &R) -> Result<()>
    where
        R: Relation + ?Sized,
    {
        let offset = self.meta.attr_byte_offset as usize;
        let mut scan = relation.scan()?;
        let mut loaded = 0usize;

        while let Some(rid) = scan.scan_next()? {
            let record = scan.record()?;
            let key = record
                .get(offset..offset + 4)
                .and_then(|bytes| bytes.try_into().ok())
                .map(i32::from_le_bytes)
                .ok_or(Error::AttributeOutOfBounds {
                    rid,
                    offset,
                    len: record.len(),
                })?;
            self.insert_entry(key, rid)?;
            loaded += 1;
        }

        self.bpm.flush_all_pages()?;
        tracing::debug!(
            index = %self.name,
            entries = loaded,
            height = self.height(),
            "bulk load finished"
        );
        Ok(())
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Add `(key, rid)` to the index. Duplicate keys are allowed.
    pub fn insert_entry(&mut self, key: i32, rid: RecordId) -> Result<()> {
        let nav = Navigator::new(
            &self.bpm,
            self.meta.leaf_capacity,
            self.meta.internal_capacity,
        );
        let old_root = self.meta.root_page_id;

        if let Some(promotion) = nav.insert(old_root, key, rid)? {
            let new_root = nav.grow_root(old_root, promotion)?;
            self.meta.root_page_id = new_root;
            self.root_level += 1;
            self.write_meta()?;
            tracing::debug!(
                index = %self.name,
                old_root = %old_root,
                new_root = %new_root,
                separator = promotion.key,
                "root split"
            );
        }
        Ok(())
    }

    fn write_meta(&self) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(META_PAGE_ID)?;
        self.meta.encode(&mut guard);
        Ok(())
    }

    // ========================================================================
    // Range scan
    // ========================================================================

    /// Position a scan on the first key satisfying both bounds.
    ///
    /// `low_op` must be `Gt` or `Gte` and `high_op` `Lt` or `Lte`. A scan
    /// already running is ended before the arguments are checked, so a
    /// failed call leaves no scan active.
    ///
    /// # Errors
    /// - `Error::BadOpcodes` for any other operator
    /// - `Error::BadScanRange` if `low > high`
    /// - `Error::NoSuchKeyFound` if the first key past the low bound is
    ///   beyond the high bound, or there is none
    pub fn start_scan(
        &mut self,
        low: i32,
        low_op: Operator,
        high: i32,
        high_op: Operator,
    ) -> Result<()> {
        self.start_scan_range(ScanRange::new(low, low_op, high, high_op))
    }

    pub fn start_scan_range(&mut self, range: ScanRange) -> Result<()> {
        let nav = Navigator::new(&self.bpm, self.meta.leaf_capacity, self.meta.internal_capacity);
        self.cursor.start(&self.bpm, &nav, self.meta.root_page_id, range)
    }

    /// Record id of the next entry in range, or `Ok(None)` when the scan is
    /// complete.
    ///
    /// # Errors
    /// `Error::ScanNotInitialized` if no scan was started.
    pub fn scan_next(&mut self) -> Result<Option<RecordId>> {
        let nav = Navigator::new(&self.bpm, self.meta.leaf_capacity, self.meta.internal_capacity);
        self.cursor.next(&self.bpm, &nav)
    }

    /// Finish the current scan and release its page.
    ///
    /// # Errors
    /// `Error::ScanNotInitialized` if no scan was started.
    pub fn end_scan(&mut self) -> Result<()> {
        self.cursor.end(&self.bpm)
    }

    /// Iterator over the rest of the current scan.
    pub fn scan_iter(&mut self) -> ScanIter<'_> {
        ScanIter { index: self }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// End any scan and flush every dirty page.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.cursor.release(&self.bpm)?;
        self.bpm.flush_all_pages()
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// File name of the index: `"<relation>.<offset>"`.
    pub fn index_name(&self) -> &str {
        &self.name
    }

    pub fn root_page_id(&self) -> PageId {
        self.meta.root_page_id
    }

    pub fn leaf_capacity(&self) -> usize {
        self.meta.leaf_capacity
    }

    pub fn internal_capacity(&self) -> usize {
        self.meta.internal_capacity
    }

    /// Levels including the leaves.
    pub fn height(&self) -> usize {
        self.root_level as usize + 1
    }

    pub fn read_leaf(&self, page_id: PageId) -> Result<LeafNode> {
        self.navigator().read_leaf(page_id)
    }

    pub fn read_internal(&self, page_id: PageId) -> Result<InternalNode> {
        self.navigator().read_internal(page_id)
    }

    /// Leaf pages in key order, following the sibling chain.
    pub fn leaf_page_ids(&self) -> Result<Vec<PageId>> {
        let nav = self.navigator();
        let mut leaves = Vec::new();
        let mut next = Some(nav.first_leaf(self.meta.root_page_id)?);
        while let Some(page_id) = next {
            leaves.push(page_id);
            next = nav.read_leaf(page_id)?.right_sibling;
        }
        Ok(leaves)
    }

    /// Page pinned by the active scan, if any.
    pub fn scan_pinned_page(&self) -> Option<PageId> {
        self.cursor.pinned_page()
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }

    /// Walk the whole tree and check its structural invariants: sorted
    /// leaves, separators bounding their subtrees, consistent levels and a
    /// sibling chain that visits the leaves in order.
    ///
    /// Leaf keys lie below the separator on their right, except for copies
    /// of that separator closing a leaf whose right sibling starts with the
    /// same key: a run of equal keys longer than a leaf has to cross leaves.
    pub fn verify(&self) -> Result<TreeShape> {
        let nav = self.navigator();
        let root = nav.read_internal(self.meta.root_page_id)?;
        let mut shape = TreeShape {
            height: root.level as usize + 1,
            ..TreeShape::default()
        };
        let mut leaves = Vec::new();
        self.verify_internal(
            &nav,
            self.meta.root_page_id,
            root,
            None,
            None,
            &mut shape,
            &mut leaves,
        )?;

        let chain = self.leaf_page_ids()?;
        if chain != leaves {
            return Err(Error::Corrupt {
                page: self.meta.root_page_id.0,
                reason: "leaf chain does not match tree order",
            });
        }
        Ok(shape)
    }

    #[allow(clippy::too_many_arguments)]
    fn verify_internal(
        &self,
        nav: &Navigator<'_>,
        page_id: PageId,
        node: InternalNode,
        lower: Option<i32>,
        upper: Option<i32>,
        shape: &mut TreeShape,
        leaves: &mut Vec<PageId>,
    ) -> Result<()> {
        let corrupt = |reason| Error::Corrupt {
            page: page_id.0,
            reason,
        };
        shape.internal_count += 1;
        if !node.keys.windows(2).all(|w| w[0] <= w[1]) {
            return Err(corrupt("separators out of order"));
        }
        if !separators_within(&node.keys, lower, upper) {
            return Err(corrupt("separator outside parent range"));
        }

        for (i, &child) in node.children.iter().enumerate() {
            let lo = if i == 0 { lower } else { Some(node.keys[i - 1]) };
            let hi = node.keys.get(i).copied().or(upper);

            if node.children_are_leaves() {
                let leaf = nav.read_leaf(child)?;
                let keys: Vec<i32> = leaf.keys().collect();
                if !keys.windows(2).all(|w| w[0] <= w[1]) {
                    return Err(Error::Corrupt {
                        page: child.0,
                        reason: "leaf keys out of order",
                    });
                }
                let mut bounded = keys.as_slice();
                if let Some(hi) = hi {
                    let run = bounded.iter().rev().take_while(|&&k| k == hi).count();
                    if run > 0 && self.run_continues(nav, &leaf, hi)? {
                        bounded = &bounded[..bounded.len() - run];
                    }
                }
                if !within(bounded, lo, hi) {
                    return Err(Error::Corrupt {
                        page: child.0,
                        reason: "leaf key outside separator range",
                    });
                }
                shape.leaf_count += 1;
                shape.entry_count += keys.len();
                leaves.push(child);
            } else {
                let child_node = nav.read_internal(child)?;
                if child_node.level + 1 != node.level {
                    return Err(Error::Corrupt {
                        page: child.0,
                        reason: "child level does not match parent",
                    });
                }
                self.verify_internal(nav, child, child_node, lo, hi, shape, leaves)?;
            }
        }
        Ok(())
    }

    /// Whether the leaf after `leaf` starts with `key`.
    fn run_continues(&self, nav: &Navigator<'_>, leaf: &LeafNode, key: i32) -> Result<bool> {
        match leaf.right_sibling {
            Some(sibling) => Ok(nav.read_leaf(sibling)?.first_key() == Some(key)),
            None => Ok(false),
        }
    }

    fn navigator(&self) -> Navigator<'_> {
        Navigator::new(&self.bpm, self.meta.leaf_capacity, self.meta.internal_capacity)
    }
}

/// Every key in `[lower, upper)`.
fn within(keys: &[i32], lower: Option<i32>, upper: Option<i32>) -> bool {
    keys.iter()
        .all(|&k| lower.map_or(true, |lo| k >= lo) && upper.map_or(true, |hi| k < hi))
}

/// Every separator in `[lower, upper]`. A separator may repeat its parent's
/// bound when a run of equal keys spans several leaves.
fn separators_within(keys: &[i32], lower: Option<i32>, upper: Option<i32>) -> bool {
    keys.iter()
        .all(|&k| lower.map_or(true, |lo| k >= lo) && upper.map_or(true, |hi| k <= hi))
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(index = %self.name, error = %e, "failed to flush index on drop");
        }
    }
}

/// Iterator over the remainder of an active scan.
///
/// A failed step is yielded as `Err`; the scan stays open until
/// [`BTreeIndex::end_scan`].
pub struct ScanIter<'a> {
    index: &'a mut BTreeIndex,
}

impl Iterator for ScanIter<'_> {
    type Item = Result<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        self.index.scan_next().transpose()
    }
}
