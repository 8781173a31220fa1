//! Root-to-leaf descent.
//!
//! The navigator pins one node at a time. On the way down a node is decoded
//! and released before its child is fetched; on the way back up it is only
//! fetched again if a split below has to be absorbed. Apart from the
//! metadata page, at most two pages (the node being split and its new
//! sibling) are pinned at once.

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result};
use crate::storage::page::Page;

use super::node::{InternalNode, LeafNode};
use super::split::{split_internal, split_leaf};

/// A split that the parent must absorb: `page_id` becomes the child to the
/// right of the separator `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Promotion {
    pub key: i32,
    pub page_id: PageId,
}

pub(crate) struct Navigator<'a> {
    bpm: &'a BufferPoolManager,
    leaf_capacity: usize,
    internal_capacity: usize,
}

impl<'a> Navigator<'a> {
    pub fn new(
        bpm: &'a BufferPoolManager,
        leaf_capacity: usize,
        internal_capacity: usize,
    ) -> Self {
        Self {
            bpm,
            leaf_capacity,
            internal_capacity,
        }
    }

    pub fn read_internal(&self, page_id: PageId) -> Result<InternalNode> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        InternalNode::decode(page_id, &guard, self.internal_capacity)
    }

    pub fn read_leaf(&self, page_id: PageId) -> Result<LeafNode> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        self.decode_leaf(page_id, &guard)
    }

    pub fn decode_leaf(&self, page_id: PageId, page: &Page) -> Result<LeafNode> {
        LeafNode::decode(page_id, page, self.leaf_capacity)
    }

    /// Leftmost leaf that may hold `key`. Every leaf before it holds only
    /// smaller keys. When `key` is a separator the leaf found may hold only
    /// smaller keys too, and the first copy is at the start of its sibling.
    pub fn find_leaf(&self, root: PageId, key: i32) -> Result<PageId> {
        let mut page_id = root;
        loop {
            let node = self.read_internal(page_id)?;
            let child = node.children[node.lower_bound_slot(key)];
            if node.children_are_leaves() {
                return Ok(child);
            }
            page_id = child;
        }
    }

    /// Leftmost leaf of the tree.
    pub fn first_leaf(&self, root: PageId) -> Result<PageId> {
        self.find_leaf(root, i32::MIN)
    }

    /// Insert below the internal node `root`. A returned promotion means
    /// `root` itself split and the caller must grow the tree.
    pub fn insert(&self, root: PageId, key: i32, rid: RecordId) -> Result<Option<Promotion>> {
        self.insert_into_internal(root, key, rid)
    }

    fn insert_into_internal(
        &self,
        page_id: PageId,
        key: i32,
        rid: RecordId,
    ) -> Result<Option<Promotion>> {
        let mut node = self.read_internal(page_id)?;
        let slot = node.child_slot(key);
        let child = node.children[slot];

        let promotion = if node.children_are_leaves() {
            self.insert_into_leaf(child, key, rid)?
        } else {
            self.insert_into_internal(child, key, rid)?
        };
        let Some(promotion) = promotion else {
            return Ok(None);
        };

        let mut guard = self.bpm.fetch_page_write(page_id)?;
        if !node.is_full(self.internal_capacity) {
            node.insert_child_at(slot, promotion.key, promotion.page_id);
            node.encode(&mut guard, self.internal_capacity);
            return Ok(None);
        }

        let mut new_guard = self.bpm.new_page()?;
        let new_page_id = new_guard.page_id();
        let (sibling, separator) =
            split_internal(&mut node, slot, promotion.key, promotion.page_id);
        node.encode(&mut guard, self.internal_capacity);
        sibling.encode(&mut new_guard, self.internal_capacity);

        tracing::trace!(
            page = %page_id,
            sibling = %new_page_id,
            level = node.level,
            separator,
            "split internal node"
        );
        Ok(Some(Promotion {
            key: separator,
            page_id: new_page_id,
        }))
    }

    fn insert_into_leaf(
        &self,
        page_id: PageId,
        key: i32,
        rid: RecordId,
    ) -> Result<Option<Promotion>> {
        let mut guard = self.bpm.fetch_page_write(page_id)?;
        let mut leaf = self.decode_leaf(page_id, &guard)?;

        if leaf.len() < self.leaf_capacity {
            leaf.insert_sorted(key, rid);
            leaf.encode(&mut guard, self.leaf_capacity);
            return Ok(None);
        }

        let mut new_guard = self.bpm.new_page()?;
        let new_page_id = new_guard.page_id();
        let (sibling, separator) = split_leaf(&mut leaf, new_page_id, key, rid);
        leaf.encode(&mut guard, self.leaf_capacity);
        sibling.encode(&mut new_guard, self.leaf_capacity);

        tracing::trace!(page = %page_id, sibling = %new_page_id, separator, "split leaf");
        Ok(Some(Promotion {
            key: separator,
            page_id: new_page_id,
        }))
    }

    /// Put a new root above `old_root` and the sibling it split off.
    /// Returns the new root's page id.
    pub fn grow_root(&self, old_root: PageId, promotion: Promotion) -> Result<PageId> {
        let level = self.read_internal(old_root)?.level + 1;
        let root = InternalNode::new_root(level, old_root, promotion.key, promotion.page_id);

        let mut guard = self.bpm.new_page()?;
        root.encode(&mut guard, self.internal_capacity);
        Ok(guard.page_id())
    }
}
