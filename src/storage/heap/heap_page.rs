//! Slotted heap page layout.
//!
//! ```text
//! Offset            Size  Field
//! ------            ----  -----
//! 0                 5     PageHeader (type = Heap)
//! 5                 2     slot_count
//! 7                 2     free_end (records occupy free_end..PAGE_SIZE)
//! 9                 4*n   slots: (offset u16, len u16)
//! ...                     free space
//! free_end..        ...   record bytes, growing downward
//! ```

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

const OFFSET_SLOT_COUNT: usize = PageHeader::SIZE;
const OFFSET_FREE_END: usize = PageHeader::SIZE + 2;
const SLOTS_START: usize = PageHeader::SIZE + 4;
const SLOT_SIZE: usize = 4;

/// Largest record a single heap page can hold.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - SLOTS_START - SLOT_SIZE;

/// View over a page interpreted as a heap page.
pub(crate) struct HeapPage;

impl HeapPage {
    pub fn init(page: &mut Page) {
        page.reset();
        page.set_page_type(PageType::Heap);
        write_u16(page, OFFSET_SLOT_COUNT, 0);
        write_u16(page, OFFSET_FREE_END, PAGE_SIZE as u16);
    }

    pub fn slot_count(page: &Page) -> u16 {
        read_u16(page, OFFSET_SLOT_COUNT)
    }

    fn free_end(page: &Page) -> usize {
        read_u16(page, OFFSET_FREE_END) as usize
    }

    fn free_space(page: &Page) -> usize {
        let slots_end = SLOTS_START + SLOT_SIZE * Self::slot_count(page) as usize;
        Self::free_end(page).saturating_sub(slots_end)
    }

    /// Append a record, returning its slot, or `None` if the page is full.
    pub fn insert(page: &mut Page, record: &[u8]) -> Option<u16> {
        if Self::free_space(page) < record.len() + SLOT_SIZE {
            return None;
        }
        let slot = Self::slot_count(page);
        let start = Self::free_end(page) - record.len();
        page.as_mut_slice()[start..start + record.len()].copy_from_slice(record);

        let slot_at = SLOTS_START + SLOT_SIZE * slot as usize;
        write_u16(page, slot_at, start as u16);
        write_u16(page, slot_at + 2, record.len() as u16);
        write_u16(page, OFFSET_SLOT_COUNT, slot + 1);
        write_u16(page, OFFSET_FREE_END, start as u16);
        Some(slot)
    }

    /// Bytes of the record in `slot`, or `None` if the slot does not exist.
    pub fn get(page_id: PageId, page: &Page, slot: u16) -> Result<Option<&[u8]>> {
        if page.page_type() != PageType::Heap {
            return Err(Error::Corrupt {
                page: page_id.0,
                reason: "not a heap page",
            });
        }
        if slot >= Self::slot_count(page) {
            return Ok(None);
        }
        let slot_at = SLOTS_START + SLOT_SIZE * slot as usize;
        let start = read_u16(page, slot_at) as usize;
        let len = read_u16(page, slot_at + 2) as usize;
        if start + len > PAGE_SIZE {
            return Err(Error::Corrupt {
                page: page_id.0,
                reason: "heap slot points past the page",
            });
        }
        Ok(Some(&page.as_slice()[start..start + len]))
    }
}

fn read_u16(page: &Page, at: usize) -> u16 {
    let data = page.as_slice();
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn write_u16(page: &mut Page, at: usize, value: u16) {
    page.as_mut_slice()[at..at + 2].copy_from_slice(&value.to_le_bytes());
}
