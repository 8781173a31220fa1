//! Node splitting.
//!
//! Both splits work on decoded nodes and return the new right sibling plus
//! the separator to push into the parent. Allocating and writing pages is
//! the navigator's job.

use std::mem;

use crate::common::{PageId, RecordId};

use super::node::{InternalNode, LeafEntry, LeafNode};

/// Split a full leaf while inserting `(key, rid)`.
///
/// `left` keeps the lower entries; the returned leaf gets the rest and is
/// linked after `left` in the sibling chain under `new_page_id`. The
/// separator is the new leaf's first key.
///
/// The cut starts at `ceil(len / 2)`, one slot further left when `key`
/// sorts below the entry there, so the incoming entry lands on the side it
/// belongs to. A cut inside a run of equal keys then moves to the nearer
/// end of the run, leaving every key of `left` strictly below the
/// separator. Only a leaf holding a single key value is cut inside its run.
pub(crate) fn split_leaf(
    left: &mut LeafNode,
    new_page_id: PageId,
    key: i32,
    rid: RecordId,
) -> (LeafNode, i32) {
    debug_assert!(!left.is_empty());

    let mut split = left.len().div_ceil(2);
    if key < left.entries[split - 1].key {
        split -= 1;
    }

    let mut entries = mem::take(&mut left.entries);
    let pos = entries.partition_point(|e| e.key <= key);
    entries.insert(pos, LeafEntry { key, rid });
    if pos <= split {
        split += 1;
    }
    let split = run_edge(&entries, split);

    let right = LeafNode {
        entries: entries.split_off(split),
        right_sibling: left.right_sibling,
    };
    left.entries = entries;
    left.right_sibling = Some(new_page_id);

    let separator = right.entries[0].key;
    (right, separator)
}

/// Move a cut that falls inside a run of equal keys to the nearer end of
/// the run, keeping both halves non-empty.
fn run_edge(entries: &[LeafEntry], split: usize) -> usize {
    let key = entries[split].key;
    if entries[split - 1].key != key {
        return split;
    }
    let start = entries.partition_point(|e| e.key < key);
    let end = entries.partition_point(|e| e.key <= key);
    match (start > 0, end < entries.len()) {
        (true, true) if end - split < split - start => end,
        (true, _) => start,
        (false, true) => end,
        (false, false) => split,
    }
}

/// Split a full internal node while absorbing `(key, child)`, which comes
/// from a split of the child at `pos`.
///
/// With `half = ceil(len / 2)`:
/// - `pos < half`: the upper half moves right, `keys[half - 1]` is pushed up
///   and the pair goes into `left`.
/// - `pos == half`: the incoming key itself is pushed up and its child
///   becomes the leftmost child of the new node.
/// - `pos > half`: `keys[half]` is pushed up and the pair goes into the new
///   node.
///
/// The new node keeps `left`'s level.
pub(crate) fn split_internal(
    left: &mut InternalNode,
    pos: usize,
    key: i32,
    child: PageId,
) -> (InternalNode, i32) {
    let half = left.keys.len().div_ceil(2);
    let level = left.level;

    if pos < half {
        let right = InternalNode {
            level,
            keys: left.keys.split_off(half),
            children: left.children.split_off(half),
        };
        // Move the boundary key out of `left`; it now separates the halves.
        let promoted = left.keys.pop();
        left.insert_child_at(pos, key, child);
        (right, promoted.unwrap_or(key))
    } else if pos == half {
        let keys = left.keys.split_off(half);
        let mut children = vec![child];
        children.extend(left.children.drain(half + 1..));
        (
            InternalNode {
                level,
                keys,
                children,
            },
            key,
        )
    } else {
        let keys = left.keys.split_off(half + 1);
        let children = left.children.split_off(half + 1);
        let promoted = left.keys.pop().unwrap_or(key);
        let mut right = InternalNode {
            level,
            keys,
            children,
        };
        right.insert_child_at(pos - (half + 1), key, child);
        (right, promoted)
    }
}
