//! Heap file - an unordered relation stored as slotted pages.

use std::path::Path;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::DiskManager;

use super::heap_page::{HeapPage, MAX_RECORD_SIZE};
use super::{RecordScan, Relation};

/// A relation stored in `<dir>/<name>`.
///
/// Records are opaque byte strings appended to the last page; a record never
/// spans pages. The file owns its own buffer pool.
///
/// # Example
/// ```no_run
/// use intindex::storage::heap::{HeapFile, RecordScan};
///
/// let mut heap = HeapFile::create("/tmp/db", "emp", 16)?;
/// let rid = heap.insert_record(&42i32.to_le_bytes())?;
/// assert_eq!(heap.get_record(rid)?, 42i32.to_le_bytes());
/// # Ok::<(), intindex::Error>(())
/// ```
pub struct HeapFile {
    name: String,
    bpm: BufferPoolManager,
    /// Page currently receiving inserts.
    last_page: Option<PageId>,
}

impl HeapFile {
    /// Create an empty relation file.
    pub fn create<P: AsRef<Path>>(dir: P, name: &str, pool_size: usize) -> Result<Self> {
        let dm = DiskManager::create(dir.as_ref().join(name))?;
        tracing::debug!(relation = name, "created heap file");
        Ok(Self {
            name: name.to_string(),
            bpm: BufferPoolManager::new(pool_size, dm),
            last_page: None,
        })
    }

    /// Open an existing relation file.
    pub fn open<P: AsRef<Path>>(dir: P, name: &str, pool_size: usize) -> Result<Self> {
        let dm = DiskManager::open(dir.as_ref().join(name))?;
        let pages = dm.page_count();
        Ok(Self {
            name: name.to_string(),
            bpm: BufferPoolManager::new(pool_size, dm),
            last_page: (pages > 1).then(|| PageId::new(pages - 1)),
        })
    }

    /// Append a record and return its locator.
    ///
    /// # Errors
    /// `Error::RecordTooLarge` if the record cannot fit in an empty page.
    pub fn insert_record(&mut self, record: &[u8]) -> Result<RecordId> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(Error::RecordTooLarge(record.len()));
        }

        if let Some(page_id) = self.last_page {
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            if let Some(slot) = HeapPage::insert(&mut guard, record) {
                return Ok(RecordId::new(page_id, slot));
            }
        }

        let mut guard = self.bpm.new_page()?;
        HeapPage::init(&mut guard);
        let slot = HeapPage::insert(&mut guard, record).ok_or(Error::RecordTooLarge(record.len()))?;
        let page_id = guard.page_id();
        self.last_page = Some(page_id);
        Ok(RecordId::new(page_id, slot))
    }

    /// Copy of the record stored at `rid`.
    pub fn get_record(&self, rid: RecordId) -> Result<Vec<u8>> {
        let guard = self.bpm.fetch_page_read(rid.page_id)?;
        HeapPage::get(rid.page_id, &guard, rid.slot)?
            .map(<[u8]>::to_vec)
            .ok_or(Error::RecordNotFound(rid))
    }

    /// Cursor over every record in page/slot order.
    pub fn scan(&self) -> FileScan<'_> {
        FileScan {
            heap: self,
            page_no: 1,
            next_slot: 0,
            current: None,
        }
    }

    /// Write all dirty pages back.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }
}

impl Relation for HeapFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn scan(&self) -> Result<Box<dyn RecordScan + '_>> {
        Ok(Box::new(HeapFile::scan(self)))
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        if let Err(e) = self.bpm.flush_all_pages() {
            tracing::warn!(relation = %self.name, error = %e, "failed to flush heap file on drop");
        }
    }
}

/// Sequential scan over a [`HeapFile`].
///
/// Each step copies the record out, so no page stays pinned between calls.
pub struct FileScan<'a> {
    heap: &'a HeapFile,
    page_no: u32,
    next_slot: u16,
    current: Option<(RecordId, Vec<u8>)>,
}

impl FileScan<'_> {
    /// Locator of the record the cursor is positioned on.
    pub fn current_rid(&self) -> Option<RecordId> {
        self.current.as_ref().map(|(rid, _)| *rid)
    }
}

impl RecordScan for FileScan<'_> {
    fn scan_next(&mut self) -> Result<Option<RecordId>> {
        let page_count = self.heap.bpm.disk_page_count();
        while self.page_no < page_count {
            let page_id = PageId::new(self.page_no);
            let guard = self.heap.bpm.fetch_page_read(page_id)?;
            if let Some(bytes) = HeapPage::get(page_id, &guard, self.next_slot)? {
                let rid = RecordId::new(page_id, self.next_slot);
                self.current = Some((rid, bytes.to_vec()));
                self.next_slot += 1;
                return Ok(Some(rid));
            }
            self.page_no += 1;
            self.next_slot = 0;
        }
        self.current = None;
        Ok(None)
    }

    fn record(&self) -> Result<&[u8]> {
        self.current
            .as_ref()
            .map(|(_, bytes)| bytes.as_slice())
            .ok_or(Error::ScanNotInitialized)
    }
}
