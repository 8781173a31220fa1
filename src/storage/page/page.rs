//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array. The buffer pool caches pages in
//! frames; the B+Tree and heap layers decode them into typed values and
//! encode them back, never reinterpreting the bytes in place.

use crate::common::config::PAGE_SIZE;

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// `Page` does not implement `Clone` outside tests: copying 4KB should be
/// explicit.
///
/// # Example
/// ```
/// use intindex::storage::page::{Page, PageType};
///
/// let mut page = Page::new();
/// page.set_page_type(PageType::BTreeLeaf);
/// assert_eq!(page.page_type(), PageType::BTreeLeaf);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes after the header, where node and heap layouts live.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.data[PageHeader::SIZE..]
    }

    #[inline]
    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.data[PageHeader::SIZE..]
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[PageHeader::OFFSET_PAGE_TYPE])
    }

    /// Tag the page, leaving the checksum to be stamped on write-back.
    #[inline]
    pub fn set_page_type(&mut self, page_type: PageType) {
        self.data[PageHeader::OFFSET_PAGE_TYPE] = page_type as u8;
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the page are complete.
    pub fn update_checksum(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Verify the page checksum.
    ///
    /// Pages that were allocated but never written carry no checksum and
    /// are accepted as long as they are still all zeros.
    pub fn verify_checksum(&self) -> bool {
        let header = self.header();
        if header.page_type == PageType::Invalid && header.checksum == 0 {
            return self.data.iter().all(|&b| b == 0);
        }
        header.verify_checksum(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}
