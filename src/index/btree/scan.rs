//! Range scan cursor.
//!
//! ```text
//!            start_scan                 range or chain exhausted
//!   Idle ───────────────▶ Active ─────────────────────────────▶ Exhausted
//!    ▲                      │                                       │
//!    └────── end_scan ──────┴────────────── end_scan ───────────────┘
//! ```
//!
//! While active, the cursor keeps its current leaf pinned (without a latch)
//! and walks a decoded copy of it, so `scan_next` never re-reads the page.

use std::mem;

use crate::buffer::{BufferPoolManager, PinnedPage};
use crate::common::{Error, Operator, PageId, RecordId, Result};

use super::navigator::Navigator;
use super::node::LeafNode;

/// Bounds of a range scan: `low <low_op> key` and `key <high_op> high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub low: i32,
    pub low_op: Operator,
    pub high: i32,
    pub high_op: Operator,
}

impl ScanRange {
    pub fn new(low: i32, low_op: Operator, high: i32, high_op: Operator) -> Self {
        Self {
            low,
            low_op,
            high,
            high_op,
        }
    }

    /// Operators are checked before the bounds.
    pub fn validate(&self) -> Result<()> {
        if !self.low_op.is_lower_bound() || !self.high_op.is_upper_bound() {
            return Err(Error::BadOpcodes {
                low: self.low_op,
                high: self.high_op,
            });
        }
        if self.low > self.high {
            return Err(Error::BadScanRange {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    #[inline]
    fn above_low(&self, key: i32) -> bool {
        self.low_op.matches(key, self.low)
    }

    #[inline]
    fn below_high(&self, key: i32) -> bool {
        self.high_op.matches(key, self.high)
    }

    pub fn contains(&self, key: i32) -> bool {
        self.above_low(key) && self.below_high(key)
    }
}

struct ActiveScan {
    pin: PinnedPage,
    leaf: LeafNode,
    next_slot: usize,
    range: ScanRange,
}

#[derive(Default)]
enum ScanState {
    #[default]
    Idle,
    Active(ActiveScan),
    /// Ran past the range; nothing is pinned.
    Exhausted,
}

/// Cursor state owned by the index.
#[derive(Default)]
pub(crate) struct ScanCursor {
    state: ScanState,
}

impl ScanCursor {
    pub fn is_active(&self) -> bool {
        !matches!(self.state, ScanState::Idle)
    }

    /// Page currently pinned by the scan.
    pub fn pinned_page(&self) -> Option<PageId> {
        match &self.state {
            ScanState::Active(scan) => Some(scan.pin.page_id()),
            _ => None,
        }
    }

    /// Position on the first entry in `range`.
    ///
    /// A scan already running is ended first, even when `range` turns out
    /// to be invalid. The descent reaches the leftmost leaf that may hold
    /// `range.low` and moves right past leaves whose keys all fall below
    /// the low bound. The first key above it decides the start: if that
    /// key is also beyond the high bound the start fails with
    /// `NoSuchKeyFound` and the cursor stays idle.
    pub fn start(
        &mut self,
        bpm: &BufferPoolManager,
        nav: &Navigator<'_>,
        root: PageId,
        range: ScanRange,
    ) -> Result<()> {
        self.release(bpm)?;
        range.validate()?;

        let mut leaf_id = nav.find_leaf(root, range.low)?;
        let (guard, leaf, slot) = loop {
            let guard = bpm.fetch_page_read(leaf_id)?;
            let leaf = nav.decode_leaf(leaf_id, &guard)?;
            let found = leaf.keys().position(|k| range.above_low(k));
            if let Some(slot) = found {
                break (guard, leaf, slot);
            }
            match leaf.right_sibling {
                Some(sibling) => leaf_id = sibling,
                None => return Err(Error::NoSuchKeyFound),
            }
        };
        if !range.below_high(leaf.entries[slot].key) {
            return Err(Error::NoSuchKeyFound);
        }

        tracing::debug!(
            leaf = %leaf_id,
            low = range.low,
            high = range.high,
            "scan started"
        );
        self.state = ScanState::Active(ActiveScan {
            pin: guard.into_pin(),
            leaf,
            next_slot: slot,
            range,
        });
        Ok(())
    }

    /// Next record id in range, or `None` once the scan is complete.
    pub fn next(
        &mut self,
        bpm: &BufferPoolManager,
        nav: &Navigator<'_>,
    ) -> Result<Option<RecordId>> {
        let scan = match &mut self.state {
            ScanState::Idle => return Err(Error::ScanNotInitialized),
            ScanState::Exhausted => return Ok(None),
            ScanState::Active(scan) => scan,
        };

        while scan.next_slot >= scan.leaf.len() {
            let Some(sibling) = scan.leaf.right_sibling else {
                self.finish(bpm)?;
                return Ok(None);
            };
            let guard = bpm.fetch_page_read(sibling)?;
            let leaf = nav.decode_leaf(sibling, &guard)?;
            let old = mem::replace(&mut scan.pin, guard.into_pin());
            scan.leaf = leaf;
            scan.next_slot = 0;
            bpm.unpin(old)?;
        }

        let entry = scan.leaf.entries[scan.next_slot];
        if !scan.range.below_high(entry.key) {
            self.finish(bpm)?;
            return Ok(None);
        }
        scan.next_slot += 1;
        Ok(Some(entry.rid))
    }

    /// End the scan, releasing its page.
    pub fn end(&mut self, bpm: &BufferPoolManager) -> Result<()> {
        match mem::take(&mut self.state) {
            ScanState::Idle => Err(Error::ScanNotInitialized),
            ScanState::Exhausted => Ok(()),
            ScanState::Active(scan) => {
                tracing::debug!(leaf = %scan.pin.page_id(), "scan ended");
                bpm.unpin(scan.pin)
            }
        }
    }

    /// Like [`end`](Self::end) but a no-op when idle.
    pub fn release(&mut self, bpm: &BufferPoolManager) -> Result<()> {
        if self.is_active() {
            self.end(bpm)?;
        }
        Ok(())
    }

    fn finish(&mut self, bpm: &BufferPoolManager) -> Result<()> {
        if let ScanState::Active(scan) = mem::replace(&mut self.state, ScanState::Exhausted) {
            bpm.unpin(scan.pin)?;
        }
        Ok(())
    }
}
