//! Storage layer - disk I/O, page formats and heap relations.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O
//! - [`page`] - Page types and layouts
//! - [`heap`] - Heap relations the index is bulk-loaded from

mod disk_manager;
pub mod heap;
pub mod page;

pub use disk_manager::DiskManager;
