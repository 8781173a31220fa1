//! B+Tree node layouts and their decoded forms.
//!
//! Nodes are decoded from page bytes into owned values, modified, and
//! encoded back. A page is only ever read as the node type its header
//! declares.
//!
//! # Leaf page
//! ```text
//! Offset  Size      Field
//! ------  ----      -----
//! 0       5         PageHeader (type = BTreeLeaf)
//! 5       2         entry count
//! 7       4         right sibling page id (u32::MAX = none)
//! 11      10*cap    entries: key i32, record page u32, record slot u16
//! ```
//!
//! # Internal page
//! ```text
//! Offset        Size         Field
//! ------        ----         -----
//! 0             5            PageHeader (type = BTreeInternal)
//! 5             2            key count
//! 7             2            level (1 = children are leaves)
//! 9             4*cap        separator keys
//! 9 + 4*cap     4*(cap+1)    child page ids
//! ```
//!
//! Slots past the count are filled with sentinels (key -1, invalid page).
//! The count alone decides occupancy, so -1 is an ordinary key.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Key written into unused slots.
const SENTINEL_KEY: i32 = -1;

const OFFSET_COUNT: usize = PageHeader::SIZE;

/// One (key, record locator) pair stored in a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    pub key: i32,
    pub rid: RecordId,
}

impl LeafEntry {
    pub const SIZE: usize = 4 + RecordId::SIZE;

    #[inline]
    pub fn new(key: i32, rid: RecordId) -> Self {
        Self { key, rid }
    }
}

/// Decoded leaf node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafNode {
    /// Entries in non-decreasing key order.
    pub entries: Vec<LeafEntry>,
    pub right_sibling: Option<PageId>,
}

impl LeafNode {
    const OFFSET_RIGHT_SIBLING: usize = OFFSET_COUNT + 2;
    const OFFSET_ENTRIES: usize = OFFSET_COUNT + 6;

    /// Most entries a leaf page can hold.
    pub const MAX_CAPACITY: usize = (PAGE_SIZE - Self::OFFSET_ENTRIES) / LeafEntry::SIZE;

    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_key(&self) -> Option<i32> {
        self.entries.first().map(|e| e.key)
    }

    pub fn keys(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// Insert after every entry whose key is `<= key`.
    pub fn insert_sorted(&mut self, key: i32, rid: RecordId) {
        let pos = self.entries.partition_point(|e| e.key <= key);
        self.entries.insert(pos, LeafEntry::new(key, rid));
    }

    /// Decode a leaf laid out for `capacity` entries.
    pub fn decode(page_id: PageId, page: &Page, capacity: usize) -> Result<Self> {
        if page.page_type() != PageType::BTreeLeaf {
            return Err(corrupt(page_id, "expected a leaf page"));
        }
        let data = page.as_slice();
        let count = read_u16(data, OFFSET_COUNT) as usize;
        if count > capacity {
            return Err(corrupt(page_id, "leaf count exceeds capacity"));
        }

        let entries = (0..count)
            .map(|i| {
                let at = Self::OFFSET_ENTRIES + i * LeafEntry::SIZE;
                LeafEntry::new(
                    read_i32(data, at),
                    RecordId::read_from(&data[at + 4..at + LeafEntry::SIZE]),
                )
            })
            .collect();

        Ok(Self {
            entries,
            right_sibling: PageId::decode(read_u32(data, Self::OFFSET_RIGHT_SIBLING)),
        })
    }

    /// Encode into `page`, tagging it as a leaf.
    ///
    /// # Panics
    /// Panics if the node holds more than `capacity` entries.
    pub fn encode(&self, page: &mut Page, capacity: usize) {
        assert!(self.len() <= capacity, "leaf overflow: {} > {capacity}", self.len());
        page.set_page_type(PageType::BTreeLeaf);
        let data = page.as_mut_slice();
        write_u16(data, OFFSET_COUNT, self.len() as u16);
        write_u32(data, Self::OFFSET_RIGHT_SIBLING, PageId::encode(self.right_sibling));

        let empty = LeafEntry::new(SENTINEL_KEY, RecordId::EMPTY);
        for slot in 0..capacity {
            let entry = self.entries.get(slot).unwrap_or(&empty);
            let at = Self::OFFSET_ENTRIES + slot * LeafEntry::SIZE;
            write_i32(data, at, entry.key);
            entry.rid.write_to(&mut data[at + 4..at + LeafEntry::SIZE]);
        }
    }
}

/// Decoded internal node.
///
/// `children.len() == keys.len() + 1`. Child `i` holds keys `< keys[i]`
/// and `>= keys[i - 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    /// Height above the leaves; 1 means the children are leaves.
    pub level: u16,
    pub keys: Vec<i32>,
    pub children: Vec<PageId>,
}

impl InternalNode {
    const OFFSET_LEVEL: usize = OFFSET_COUNT + 2;
    const OFFSET_KEYS: usize = OFFSET_COUNT + 4;

    /// Most separator keys an internal page can hold.
    pub const MAX_CAPACITY: usize = (PAGE_SIZE - Self::OFFSET_KEYS - 4) / 8;

    /// Node with a single child and no separators.
    pub fn with_child(level: u16, child: PageId) -> Self {
        Self {
            level,
            keys: Vec::new(),
            children: vec![child],
        }
    }

    /// Root produced when the old root splits.
    pub fn new_root(level: u16, left: PageId, key: i32, right: PageId) -> Self {
        Self {
            level,
            keys: vec![key],
            children: vec![left, right],
        }
    }

    #[inline]
    pub fn is_full(&self, capacity: usize) -> bool {
        self.keys.len() >= capacity
    }

    #[inline]
    pub fn children_are_leaves(&self) -> bool {
        self.level == 1
    }

    /// Index of the child whose range covers `key`: the first separator
    /// strictly greater than `key`, or the rightmost child.
    #[inline]
    pub fn child_slot(&self, key: i32) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Leftmost child that may hold `key`: the first separator at or above
    /// `key`, or the rightmost child. Copies of a separator can sit left of
    /// it when a run of equal keys filled a whole leaf, so lookups that must
    /// see every copy descend this way.
    #[inline]
    pub fn lower_bound_slot(&self, key: i32) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    /// Absorb a split below child `slot`: `key` becomes the separator right
    /// of that child and `child` the pointer after it.
    pub fn insert_child_at(&mut self, slot: usize, key: i32, child: PageId) {
        self.keys.insert(slot, key);
        self.children.insert(slot + 1, child);
    }

    fn children_offset(capacity: usize) -> usize {
        Self::OFFSET_KEYS + 4 * capacity
    }

    /// Decode an internal node laid out for `capacity` keys.
    pub fn decode(page_id: PageId, page: &Page, capacity: usize) -> Result<Self> {
        if page.page_type() != PageType::BTreeInternal {
            return Err(corrupt(page_id, "expected an internal page"));
        }
        let data = page.as_slice();
        let count = read_u16(data, OFFSET_COUNT) as usize;
        if count > capacity {
            return Err(corrupt(page_id, "internal key count exceeds capacity"));
        }
        let level = read_u16(data, Self::OFFSET_LEVEL);
        if level == 0 {
            return Err(corrupt(page_id, "internal node at level 0"));
        }

        let keys = (0..count)
            .map(|i| read_i32(data, Self::OFFSET_KEYS + 4 * i))
            .collect();
        let base = Self::children_offset(capacity);
        let children = (0..=count)
            .map(|i| {
                PageId::decode(read_u32(data, base + 4 * i))
                    .ok_or_else(|| corrupt(page_id, "missing child pointer"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            level,
            keys,
            children,
        })
    }

    /// Encode into `page`, tagging it as an internal node.
    ///
    /// # Panics
    /// Panics if the node holds more than `capacity` keys.
    pub fn encode(&self, page: &mut Page, capacity: usize) {
        assert!(
            self.keys.len() <= capacity,
            "internal overflow: {} > {capacity}",
            self.keys.len()
        );
        debug_assert_eq!(self.children.len(), self.keys.len() + 1);

        page.set_page_type(PageType::BTreeInternal);
        let data = page.as_mut_slice();
        write_u16(data, OFFSET_COUNT, self.keys.len() as u16);
        write_u16(data, Self::OFFSET_LEVEL, self.level);

        for slot in 0..capacity {
            let key = self.keys.get(slot).copied().unwrap_or(SENTINEL_KEY);
            write_i32(data, Self::OFFSET_KEYS + 4 * slot, key);
        }
        let base = Self::children_offset(capacity);
        for slot in 0..=capacity {
            let child = self.children.get(slot).copied();
            write_u32(data, base + 4 * slot, PageId::encode(child));
        }
    }
}

fn corrupt(page_id: PageId, reason: &'static str) -> Error {
    Error::Corrupt {
        page: page_id.0,
        reason,
    }
}

pub(crate) fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

pub(crate) fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

pub(crate) fn write_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_i32(data: &mut [u8], at: usize, value: i32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}
