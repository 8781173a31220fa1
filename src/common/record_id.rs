//! Record locator type.

use std::fmt;

use crate::common::PageId;

/// Locates a tuple inside a heap relation: the heap page plus the slot
/// within that page.
///
/// Leaf nodes store one of these next to every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    /// Encoded size inside a leaf slot (page u32 + slot u16).
    pub const SIZE: usize = 6;

    /// Locator written into unused leaf slots.
    pub const EMPTY: RecordId = RecordId {
        page_id: PageId::INVALID,
        slot: u16::MAX,
    };

    #[inline]
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }

    /// Write the locator into the first [`RecordId::SIZE`] bytes of `buf`.
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_id.0.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot.to_le_bytes());
    }

    /// Read a locator from the first [`RecordId::SIZE`] bytes of `buf`.
    pub fn read_from(buf: &[u8]) -> Self {
        let page = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let slot = u16::from_le_bytes([buf[4], buf[5]]);
        Self::new(PageId::new(page), slot)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, slot {})", self.page_id, self.slot)
    }
}
