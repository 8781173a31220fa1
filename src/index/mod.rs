//! Index structures.
//!
//! A [`BTreeIndex`] maps the `i32` value of one attribute of a relation to
//! the [`RecordId`](crate::RecordId)s of the tuples holding it.

pub mod btree;

pub use btree::{BTreeIndex, ScanIter, ScanRange, TreeShape};
