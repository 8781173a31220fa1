//! Common types and utilities shared across intindex.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`IndexConfig`](config::IndexConfig)
//! - Error types
//! - Identifiers (PageId, RecordId)
//! - Attribute type tags and scan operators

pub mod config;
pub mod error;
mod page_id;
mod record_id;
mod types;

pub use error::{Error, Result};
pub use page_id::PageId;
pub use record_id::RecordId;
pub use types::{Datatype, Operator};
