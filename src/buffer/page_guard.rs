//! RAII guards for page access.
//!
//! These guards provide safe access to pages in the buffer pool:
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive write access, dirty once mutated
//! - [`PinnedPage`] - A pin without a latch, for cursors that park on a page
//!
//! Guards unpin the page when dropped, so every early return through `?`
//! still releases what it fetched.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::FrameId;
use crate::common::PageId;
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is unpinned, clean, when the guard is dropped.
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
    /// Cleared by `into_pin` when the pin is handed over.
    unpin_on_drop: bool,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
            unpin_on_drop: true,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Release the latch but keep the page pinned.
    ///
    /// The returned [`PinnedPage`] must be given back through
    /// [`BufferPoolManager::unpin`].
    pub fn into_pin(mut self) -> PinnedPage {
        self.unpin_on_drop = false;
        PinnedPage {
            frame_id: self.frame_id,
            page_id: self.page_id,
        }
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        if self.unpin_on_drop {
            self.bpm.unpin_page_internal(self.frame_id, false);
        }
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time. The page is
/// released as modified only if it was mutably dereferenced (or freshly
/// allocated); a guard that only read the page releases it clean.
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
    dirty: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
        dirty: bool,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
            dirty,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Whether the page will be released as modified.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.dirty = true;
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, self.dirty);
    }
}

/// A page kept resident without holding its latch.
///
/// Produced by [`PageReadGuard::into_pin`]. Dropping it without calling
/// [`BufferPoolManager::unpin`] leaks the pin.
#[must_use = "a pinned page must be handed back with BufferPoolManager::unpin"]
#[derive(Debug, PartialEq, Eq)]
pub struct PinnedPage {
    pub(crate) frame_id: FrameId,
    pub(crate) page_id: PageId,
}

impl PinnedPage {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}
