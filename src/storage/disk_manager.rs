//! Disk Manager - low-level file I/O for pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating new pages
//! - Writing and checking the superblock

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageType};

/// Magic bytes at the start of the superblock body.
const MAGIC: &[u8; 8] = b"INTIDX01";

/// Manages disk I/O for a single file.
///
/// # File Layout
/// ```text
/// ┌────────────┬─────────┬─────────┬─────────┐
/// │   Page 0   │ Page 1  │  ...    │ Page N  │
/// │ superblock │ (4KB)   │         │ (4KB)   │
/// └────────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     ...    N×4096
/// ```
///
/// The superblock holds a magic string and the page size so that opening a
/// foreign file fails early instead of decoding garbage.
///
/// # Durability
/// Individual writes are not fsync'd. [`DiskManager::sync`] is called by
/// the buffer pool when it flushes everything.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file, superblock included.
    page_count: u32,
}

impl DiskManager {
    /// Create a new file and write its superblock.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut dm = Self {
            file,
            page_count: 0,
        };

        let superblock = dm.allocate_page()?;
        let mut page = Page::new();
        page.set_page_type(PageType::Superblock);
        page.body_mut()[..MAGIC.len()].copy_from_slice(MAGIC);
        page.body_mut()[MAGIC.len()..MAGIC.len() + 4]
            .copy_from_slice(&(PAGE_SIZE as u32).to_le_bytes());
        page.update_checksum();
        dm.write_page(superblock, &page)?;
        dm.sync()?;

        Ok(dm)
    }

    /// Open an existing file and check its superblock.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or was
    /// not created by a `DiskManager`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        let mut dm = Self { file, page_count };
        let bad = || Error::BadFileFormat(path.as_ref().display().to_string());

        if page_count == 0 {
            return Err(bad());
        }
        let page = dm.read_page(PageId::new(0))?;
        let body = page.body();
        let stored_size = u32::from_le_bytes([body[8], body[9], body[10], body[11]]);
        if page.page_type() != PageType::Superblock
            || !page.verify_checksum()
            || &body[..MAGIC.len()] != MAGIC
            || stored_size as usize != PAGE_SIZE
        {
            return Err(bad());
        }

        Ok(dm)
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// The page must have been previously allocated with `allocate_page()`.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(page.as_slice())?;

        Ok(())
    }

    /// Allocate a new zeroed page at the end of the file.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.page_count);

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Force written pages to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Number of pages in the file, superblock included.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    #[inline]
    fn offset(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }
}
