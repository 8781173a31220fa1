//! Buffer Pool Manager - the page store underneath the index.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting
//! - Dirty page write-back with checksums
//! - FIFO eviction of unpinned frames

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::{
    BufferPoolStats, Frame, FrameId, PageReadGuard, PageWriteGuard, PinnedPage,
};
use crate::common::{Error, PageId, Result};
use crate::storage::DiskManager;

/// Manages a pool of buffer frames for caching the pages of one file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ FifoReplacer │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Page store contract
/// | operation          | API                                           |
/// |--------------------|-----------------------------------------------|
/// | allocate           | [`new_page`](Self::new_page)                  |
/// | fetch              | [`fetch_page_read`](Self::fetch_page_read) / [`fetch_page_write`](Self::fetch_page_write) |
/// | release(modified)  | guard drop, or [`unpin`](Self::unpin) for a [`PinnedPage`] |
/// | flush all          | [`flush_all_pages`](Self::flush_all_pages)    |
///
/// Every fetch pins the frame once; every guard drop or `unpin` releases
/// that pin exactly once.
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs.
    free_list: Mutex<Vec<FrameId>>,

    replacer: Mutex<FifoReplacer>,

    disk_manager: Mutex<DiskManager>,

    stats: BufferPoolStats,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager over an opened file.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        // Reversed so that pops hand out frame 0 first.
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(FifoReplacer::new(pool_size)),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
        }
    }

    // ========================================================================
    // Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::ChecksumMismatch` if the on-disk copy is damaged
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// The page is released as modified only if the guard was mutably
    /// dereferenced.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock, false))
    }

    /// Allocate a new zeroed page at the end of the file and pin it.
    ///
    /// The returned guard is already dirty, so the page reaches disk even if
    /// the caller leaves it blank.
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let page_id = {
            let mut dm = self.disk_manager.lock();
            match dm.allocate_page() {
                Ok(page_id) => page_id,
                Err(e) => {
                    self.free_list.lock().push(frame_id);
                    return Err(e);
                }
            }
        };
        BufferPoolStats::bump(&self.stats.pages_allocated);

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.set_page_id(Some(page_id));
        frame.pin();

        self.page_table.write().insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock, true))
    }

    /// Give back a pin obtained from [`PageReadGuard::into_pin`].
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the frame no longer holds that page or has
    /// no outstanding pin.
    pub fn unpin(&self, pin: PinnedPage) -> Result<()> {
        let frame = &self.frames[pin.frame_id.0];
        if frame.page_id() != Some(pin.page_id) || !frame.is_pinned() {
            return Err(Error::PageNotPinned(pin.page_id.0));
        }
        self.unpin_page_internal(pin.frame_id, false);
        Ok(())
    }

    // ========================================================================
    // Flush pages
    // ========================================================================

    /// Write every dirty page back and sync the file.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        let mut written = 0usize;
        for (page_id, frame_id) in pages {
            if self.flush_frame(frame_id, page_id)? {
                written += 1;
            }
        }
        self.disk_manager.lock().sync()?;

        tracing::debug!(written, "flushed buffer pool");
        Ok(())
    }

    // ========================================================================
    // Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of pages resident in the pool.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of pages in the underlying file, superblock included.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    /// Pin count of a resident page, `None` if the page is not in the pool.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let pt = self.page_table.read();
        pt.get(&page_id).map(|fid| self.frames[fid.0].pin_count())
    }

    /// Number of frames with at least one outstanding pin.
    pub fn pinned_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    // ========================================================================
    // Internal: called by guards on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        match frame.unpin() {
            Some(0) => self.replacer.lock().set_evictable(frame_id, true),
            Some(_) => {}
            None => tracing::warn!(frame = %frame_id, "unpin of a frame with no pins"),
        }
    }

    // ========================================================================
    // Internal: core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        {
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&page_id) {
                self.handle_cache_hit(frame_id);
                return Ok(frame_id);
            }
        }

        self.handle_cache_miss(page_id)
    }

    fn handle_cache_hit(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }
        BufferPoolStats::bump(&self.stats.cache_hits);
    }

    /// Read the page before claiming a frame so a failed read cannot leak
    /// one.
    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        BufferPoolStats::bump(&self.stats.cache_misses);

        let page_data = self.disk_manager.lock().read_page(page_id)?;
        if !page_data.verify_checksum() {
            return Err(Error::ChecksumMismatch(page_id.0));
        }

        let frame_id = self.get_free_frame()?;
        let frame = &self.frames[frame_id.0];
        frame
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page_data.as_slice());
        frame.set_page_id(Some(page_id));
        frame.pin();

        self.page_table.write().insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame_id)
    }

    // ========================================================================
    // Internal: frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }
        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self
            .replacer
            .lock()
            .evict()
            .ok_or(Error::NoFreeFrames)?;

        BufferPoolStats::bump(&self.stats.evictions);

        let frame = &self.frames[frame_id.0];
        if let Some(pid) = frame.page_id() {
            if let Err(e) = self.flush_frame(frame_id, pid) {
                // Leave the victim resident and evictable again.
                self.replacer.lock().record_access(frame_id);
                self.replacer.lock().set_evictable(frame_id, true);
                return Err(e);
            }
            self.page_table.write().remove(&pid);
            tracing::trace!(page = %pid, frame = %frame_id, "evicted page");
        }

        frame.clear_dirty();
        frame.set_page_id(None);

        Ok(frame_id)
    }

    /// Stamp the checksum and write the frame back if dirty. Returns whether
    /// a write happened.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<bool> {
        let frame = &self.frames[frame_id.0];
        if !frame.is_dirty() {
            return Ok(false);
        }

        let mut page = frame.page_mut();
        page.update_checksum();
        self.disk_manager.lock().write_page(page_id, &page)?;
        drop(page);

        frame.clear_dirty();
        BufferPoolStats::bump(&self.stats.pages_written);
        Ok(true)
    }
}
