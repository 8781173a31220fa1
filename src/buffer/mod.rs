//! Buffer pool management.
//!
//! The buffer pool is the page store the B+Tree and heap files are built
//! on. It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The page cache
//! - [`Frame`] - A slot in the buffer pool holding a page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for page access
//! - [`PinnedPage`] - A latch-free pin for long-lived cursors
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::{Frame, FrameId};
pub use page_guard::{PageReadGuard, PageWriteGuard, PinnedPage};
pub use stats::{BufferPoolStats, StatsSnapshot};
