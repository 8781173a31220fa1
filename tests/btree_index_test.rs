//! Integration tests for the B+Tree index: structure, scans and lifecycle.

mod common;

use common::{leaf_keys, open_index, rid_for, scan_rids, small_config, MemRelation};
use intindex::storage::heap::HeapFile;
use intindex::{BTreeIndex, Datatype, Error, IndexConfig, Operator, PageId, RecordId};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

fn rid(n: i32) -> RecordId {
    RecordId::new(PageId::new(10_000 + n as u32), (n % 7) as u16)
}

/// Empty index with explicit node capacities.
fn empty_index(leaf: usize, internal: usize) -> (BTreeIndex, tempfile::TempDir) {
    let (config, dir) = small_config(leaf, internal);
    let index = open_index(config, &MemRelation::new("t"));
    (index, dir)
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_fresh_index_shape() {
    let (index, dir) = empty_index(4, 4);

    assert_eq!(index.index_name(), "t.0");
    assert!(dir.path().join("t.0").exists());
    assert_eq!(index.height(), 2);

    let root = index.read_internal(index.root_page_id()).unwrap();
    assert_eq!(root.level, 1);
    assert!(root.keys.is_empty());
    assert_eq!(root.children.len(), 1);
    assert!(index.read_leaf(root.children[0]).unwrap().is_empty());

    let shape = index.verify().unwrap();
    assert_eq!(shape.height, 2);
    assert_eq!(shape.leaf_count, 1);
    assert_eq!(shape.entry_count, 0);
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
}

#[test]
fn test_leaves_stay_sorted_under_shuffled_inserts() {
    let (mut index, _dir) = empty_index(5, 3);

    const N: i32 = 2000;
    for i in 0..N {
        let key = (i * 7919) % N;
        index.insert_entry(key, rid(key)).unwrap();
    }

    let keys = leaf_keys(&index);
    assert_eq!(keys, (0..N).collect::<Vec<_>>());
    for pid in index.leaf_page_ids().unwrap() {
        let leaf = index.read_leaf(pid).unwrap();
        assert!(!leaf.is_empty());
        assert!(leaf.len() <= index.leaf_capacity());
        assert!(leaf.keys().zip(leaf.keys().skip(1)).all(|(a, b)| a <= b));
    }

    let shape = index.verify().unwrap();
    assert_eq!(shape.entry_count, N as usize);
    assert_eq!(shape.height, index.height());
}

#[test]
fn test_separators_bound_their_children() {
    let (mut index, _dir) = empty_index(4, 4);
    for key in (0..300).rev() {
        index.insert_entry(key * 3, rid(key)).unwrap();
    }

    // Walk one level by hand on top of verify().
    index.verify().unwrap();
    let root = index.read_internal(index.root_page_id()).unwrap();
    for (i, &sep) in root.keys.iter().enumerate() {
        let left = root.children[i];
        let right = root.children[i + 1];
        let left_max = max_key(&index, left);
        let right_min = min_key(&index, right);
        assert!(left_max < sep, "child {i} holds {left_max} >= {sep}");
        assert!(right_min >= sep);
    }
}

fn min_key(index: &BTreeIndex, mut page: PageId) -> i32 {
    loop {
        match index.read_internal(page) {
            Ok(node) => page = node.children[0],
            Err(_) => return index.read_leaf(page).unwrap().first_key().unwrap(),
        }
    }
}

fn max_key(index: &BTreeIndex, mut page: PageId) -> i32 {
    loop {
        match index.read_internal(page) {
            Ok(node) => page = *node.children.last().unwrap(),
            Err(_) => return index.read_leaf(page).unwrap().keys().last().unwrap(),
        }
    }
}

#[test]
fn test_leaf_split_at_capacity_plus_one() {
    let (mut index, _dir) = empty_index(4, 4);
    for key in 1..=4 {
        index.insert_entry(key * 10, rid(key)).unwrap();
    }
    assert_eq!(index.leaf_page_ids().unwrap().len(), 1);

    index.insert_entry(50, rid(5)).unwrap();

    let leaves = index.leaf_page_ids().unwrap();
    assert_eq!(leaves.len(), 2);
    let left = index.read_leaf(leaves[0]).unwrap();
    let right = index.read_leaf(leaves[1]).unwrap();
    assert_eq!(left.right_sibling, Some(leaves[1]));
    assert_eq!(right.right_sibling, None);

    let mut all: Vec<i32> = left.keys().chain(right.keys()).collect();
    all.sort();
    assert_eq!(all, vec![10, 20, 30, 40, 50]);

    let root = index.read_internal(index.root_page_id()).unwrap();
    assert_eq!(root.keys, vec![right.first_key().unwrap()]);
    assert_eq!(root.children, leaves);
    assert_eq!(index.height(), 2);
}

#[test]
fn test_root_growth() {
    let (mut index, _dir) = empty_index(2, 2);
    let mut key = 0;

    for expected_height in 3..=5 {
        let old_root = index.root_page_id();
        let old_height = index.height();
        while index.root_page_id() == old_root {
            index.insert_entry(key, rid(key)).unwrap();
            key += 1;
        }

        assert_eq!(index.height(), old_height + 1);
        assert_eq!(index.height(), expected_height);
        let root = index.read_internal(index.root_page_id()).unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0], old_root);
        assert_eq!(root.level as usize, expected_height - 1);

        let rids = scan_rids(&mut index, 0, Operator::Gte, key - 1, Operator::Lte).unwrap();
        assert_eq!(rids, (0..key).map(rid).collect::<Vec<_>>());
    }

    index.verify().unwrap();
}

#[test]
fn test_negative_and_duplicate_keys() {
    let (mut index, _dir) = empty_index(16, 4);
    let keys = [-1, 5, -1, -100, 0, 5, -1, i32::MIN, i32::MAX];
    for (i, &key) in keys.iter().enumerate() {
        index.insert_entry(key, rid(i as i32)).unwrap();
    }

    assert_eq!(
        leaf_keys(&index),
        vec![i32::MIN, -100, -1, -1, -1, 0, 5, 5, i32::MAX]
    );

    // Duplicates come back in insertion order.
    let minus_one = scan_rids(&mut index, -1, Operator::Gte, -1, Operator::Lte).unwrap();
    assert_eq!(minus_one, vec![rid(0), rid(2), rid(6)]);

    let everything =
        scan_rids(&mut index, i32::MIN, Operator::Gte, i32::MAX, Operator::Lte).unwrap();
    assert_eq!(everything.len(), keys.len());
}

#[test]
fn test_duplicates_spanning_several_leaves() {
    let (mut index, _dir) = empty_index(4, 4);
    for i in 0..10 {
        index.insert_entry(7, rid(i)).unwrap();
    }
    assert!(index.leaf_page_ids().unwrap().len() > 1);
    let shape = index.verify().unwrap();
    assert_eq!(shape.entry_count, 10);

    // Every copy comes back, oldest first.
    let sevens = scan_rids(&mut index, 7, Operator::Gte, 7, Operator::Lte).unwrap();
    assert_eq!(sevens, (0..10).map(rid).collect::<Vec<_>>());

    let (mut index, _dir) = empty_index(4, 4);
    let mut n = 0;
    for round in 0..6 {
        for key in [3, 7, 7, 7, 11] {
            index.insert_entry(key, rid(n)).unwrap();
            n += 1;
        }
        index.insert_entry(round, rid(n)).unwrap();
        n += 1;
    }
    index.verify().unwrap();

    let sevens = scan_rids(&mut index, 7, Operator::Gte, 7, Operator::Lte).unwrap();
    assert_eq!(sevens.len(), 18);
    let threes = scan_rids(&mut index, 3, Operator::Gte, 3, Operator::Lte).unwrap();
    assert_eq!(threes.len(), 7);
    let above_three = scan_rids(&mut index, 3, Operator::Gt, 11, Operator::Lt).unwrap();
    assert_eq!(above_three.len(), 2 + 18);
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
}

#[test]
fn test_low_bound_on_separator_starts_in_next_leaf() {
    let (mut index, _dir) = empty_index(4, 4);
    for key in 1..=5 {
        index.insert_entry(key * 10, rid(key)).unwrap();
    }
    // The root separates [10, 20] from [30, 40, 50].
    let root = index.read_internal(index.root_page_id()).unwrap();
    assert_eq!(root.keys, vec![30]);

    let rids = scan_rids(&mut index, 30, Operator::Gte, 40, Operator::Lte).unwrap();
    assert_eq!(rids, vec![rid(3), rid(4)]);
    let rids = scan_rids(&mut index, 25, Operator::Gt, 30, Operator::Lte).unwrap();
    assert_eq!(rids, vec![rid(3)]);
    assert!(matches!(
        index.start_scan(21, Operator::Gte, 29, Operator::Lte),
        Err(Error::NoSuchKeyFound)
    ));
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
}

// ============================================================================
// Scans
// ============================================================================

#[test]
fn test_round_trip_scan() {
    let (mut index, _dir) = empty_index(6, 5);
    let keys: Vec<i32> = (0..1500).map(|i| (i * 37) % 1500 - 700).collect();
    for &key in &keys {
        index.insert_entry(key, rid(key + 700)).unwrap();
    }

    let rids = scan_rids(&mut index, -700, Operator::Gte, 799, Operator::Lte).unwrap();
    let expected: Vec<RecordId> = (-700..800).map(|k| rid(k + 700)).collect();
    assert_eq!(rids, expected);
}

#[test]
fn test_scenario_scan_500_to_600() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let rel = MemRelation::with_keys("relA", 0..1000);
    let mut index = open_index(IndexConfig::new(dir.path()), &rel);

    index.start_scan(500, Operator::Gte, 600, Operator::Lte).unwrap();
    let mut seen = Vec::new();
    while let Some(rid) = index.scan_next().unwrap() {
        seen.push(rid);
    }
    assert_eq!(seen, (500..=600).map(rid_for).collect::<Vec<_>>());

    // Completion is sticky until the scan is ended.
    assert_eq!(index.scan_next().unwrap(), None);
    index.end_scan().unwrap();
    assert!(matches!(index.scan_next(), Err(Error::ScanNotInitialized)));
}

#[test]
fn test_scenario_with_small_nodes() {
    let (config, _dir) = small_config(3, 3);
    let rel = MemRelation::with_keys("relA", 0..1000);
    let mut index = open_index(config, &rel);
    assert!(index.height() > 4);

    let rids = scan_rids(&mut index, 500, Operator::Gte, 600, Operator::Lte).unwrap();
    assert_eq!(rids, (500..=600).map(rid_for).collect::<Vec<_>>());
}

#[test]
fn test_exclusive_bounds() {
    let (config, _dir) = small_config(4, 4);
    let rel = MemRelation::with_keys("r", 0..100);
    let mut index = open_index(config, &rel);

    let open = scan_rids(&mut index, 10, Operator::Gt, 20, Operator::Lt).unwrap();
    assert_eq!(open, (11..20).map(rid_for).collect::<Vec<_>>());

    let half_open = scan_rids(&mut index, 10, Operator::Gt, 20, Operator::Lte).unwrap();
    assert_eq!(half_open, (11..=20).map(rid_for).collect::<Vec<_>>());

    let point = scan_rids(&mut index, 42, Operator::Gte, 42, Operator::Lte).unwrap();
    assert_eq!(point, vec![rid_for(42)]);

    // Running past the last leaf completes the scan.
    let tail = scan_rids(&mut index, 95, Operator::Gte, 1_000_000, Operator::Lte).unwrap();
    assert_eq!(tail, (95..100).map(rid_for).collect::<Vec<_>>());
}

#[test]
fn test_bad_scan_arguments() {
    let (config, _dir) = small_config(4, 4);
    let mut index = open_index(config, &MemRelation::with_keys("r", 0..50));

    assert!(matches!(
        index.start_scan(1, Operator::Lt, 10, Operator::Lte),
        Err(Error::BadOpcodes {
            low: Operator::Lt,
            ..
        })
    ));
    assert!(matches!(
        index.start_scan(1, Operator::Gte, 10, Operator::Gte),
        Err(Error::BadOpcodes { .. })
    ));
    assert!(matches!(
        index.start_scan(10, Operator::Gt, 5, Operator::Lte),
        Err(Error::BadScanRange { low: 10, high: 5 })
    ));

    // Failed starts leave nothing pinned and no scan running.
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
    assert!(matches!(index.end_scan(), Err(Error::ScanNotInitialized)));
}

#[test]
fn test_bad_start_ends_running_scan() {
    let (config, _dir) = small_config(4, 4);
    let mut index = open_index(config, &MemRelation::with_keys("r", 0..50));

    index.start_scan(0, Operator::Gte, 49, Operator::Lte).unwrap();
    assert_eq!(index.scan_next().unwrap(), Some(rid_for(0)));
    assert_eq!(index.buffer_pool().pinned_frame_count(), 1);

    assert!(matches!(
        index.start_scan(20, Operator::Gte, 10, Operator::Lte),
        Err(Error::BadScanRange { .. })
    ));
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
    assert!(matches!(index.scan_next(), Err(Error::ScanNotInitialized)));
}

#[test]
fn test_scan_without_start() {
    let (mut index, _dir) = empty_index(4, 4);
    assert!(matches!(index.scan_next(), Err(Error::ScanNotInitialized)));
    assert!(matches!(index.end_scan(), Err(Error::ScanNotInitialized)));
}

#[test]
fn test_no_such_key() {
    let (mut index, _dir) = empty_index(8, 4);
    assert!(matches!(
        index.start_scan(0, Operator::Gte, 10, Operator::Lte),
        Err(Error::NoSuchKeyFound)
    ));

    for key in [0, 10, 20, 30] {
        index.insert_entry(key, rid(key)).unwrap();
    }
    // The gap 11..=19 lies inside a single leaf.
    assert!(matches!(
        index.start_scan(11, Operator::Gte, 19, Operator::Lte),
        Err(Error::NoSuchKeyFound)
    ));
    assert!(matches!(
        index.start_scan(30, Operator::Gt, 40, Operator::Lte),
        Err(Error::NoSuchKeyFound)
    ));
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
    assert!(index.scan_pinned_page().is_none());
}

#[test]
fn test_restart_scan_discards_previous_cursor() {
    let (config, _dir) = small_config(4, 4);
    let rel = MemRelation::with_keys("r", 0..200);
    let mut index = open_index(config, &rel);

    index.start_scan(0, Operator::Gte, 199, Operator::Lte).unwrap();
    for _ in 0..3 {
        index.scan_next().unwrap().unwrap();
    }
    let first_page = index.scan_pinned_page().unwrap();

    // No end_scan in between: the new scan replaces the old one.
    index.start_scan(150, Operator::Gte, 152, Operator::Lte).unwrap();
    assert_ne!(index.scan_pinned_page(), Some(first_page));
    assert_eq!(index.buffer_pool().pinned_frame_count(), 1);

    let rids: Vec<RecordId> = index.scan_iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(rids, vec![rid_for(150), rid_for(151), rid_for(152)]);
    index.end_scan().unwrap();

    let again = scan_rids(&mut index, 3, Operator::Gte, 4, Operator::Lte).unwrap();
    assert_eq!(again, vec![rid_for(3), rid_for(4)]);
}

#[test]
fn test_pin_balance() {
    let (config, _dir) = small_config(3, 3);
    let rel = MemRelation::with_keys("r", (0..500).rev());
    let mut index = open_index(config, &rel);
    let bpm_pins = |index: &BTreeIndex| index.buffer_pool().pinned_frame_count();

    assert_eq!(bpm_pins(&index), 0);
    index.insert_entry(1000, rid(1)).unwrap();
    assert_eq!(bpm_pins(&index), 0);

    index.start_scan(10, Operator::Gte, 400, Operator::Lt).unwrap();
    for _ in 0..100 {
        index.scan_next().unwrap().unwrap();
        assert_eq!(bpm_pins(&index), 1);
    }
    let pinned = index.scan_pinned_page().unwrap();
    assert_eq!(index.buffer_pool().pin_count(pinned), Some(1));

    index.end_scan().unwrap();
    assert_eq!(bpm_pins(&index), 0);

    index.verify().unwrap();
    index.leaf_page_ids().unwrap();
    assert_eq!(bpm_pins(&index), 0);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_reopen_uses_stored_tree() {
    let (config, dir) = small_config(8, 6);
    let root;
    {
        let rel = MemRelation::with_keys("emp", 0..300);
        let mut index = open_index(config, &rel);
        root = index.root_page_id();
        index.start_scan(0, Operator::Gte, 10, Operator::Lte).unwrap();
        // Closing with a scan open still succeeds.
        index.close().unwrap();
    }

    // Defaults ask for the largest nodes; the stored capacities win, and the
    // empty relation proves nothing is rebuilt.
    let mut index = open_index(IndexConfig::new(dir.path()), &MemRelation::new("emp"));
    assert_eq!(index.leaf_capacity(), 8);
    assert_eq!(index.internal_capacity(), 6);
    assert_eq!(index.root_page_id(), root);

    let rids = scan_rids(&mut index, 0, Operator::Gte, 299, Operator::Lte).unwrap();
    assert_eq!(rids, (0..300).map(rid_for).collect::<Vec<_>>());

    // Inserts after a reopen land in the same tree.
    index.insert_entry(300, rid_for(300)).unwrap();
    drop(index);
    let mut index = open_index(IndexConfig::new(dir.path()), &MemRelation::new("emp"));
    let tail = scan_rids(&mut index, 299, Operator::Gte, 300, Operator::Lte).unwrap();
    assert_eq!(tail, vec![rid_for(299), rid_for(300)]);
}

#[test]
fn test_descriptor_mismatch() {
    let (config, dir) = small_config(4, 4);
    drop(open_index(config.clone(), &MemRelation::with_keys("emp", 0..10)));

    // An index file carrying another relation's descriptor.
    std::fs::rename(dir.path().join("emp.0"), dir.path().join("dept.0")).unwrap();
    let result = BTreeIndex::open_or_create(config, &MemRelation::new("dept"), 0, Datatype::Integer);
    assert!(matches!(result, Err(Error::BadIndexInfo(name)) if name == "dept.0"));
}

#[test]
fn test_rejected_descriptors() {
    let (config, dir) = small_config(4, 4);
    let rel = MemRelation::with_keys("emp", 0..10);

    assert!(matches!(
        BTreeIndex::open_or_create(config.clone(), &rel, 0, Datatype::Double),
        Err(Error::UnsupportedAttrType(Datatype::Double))
    ));

    let long = MemRelation::new("a_relation_name_too_long");
    assert!(matches!(
        BTreeIndex::open_or_create(config.clone(), &long, 0, Datatype::Integer),
        Err(Error::InvalidRelationName(_))
    ));

    let bad_config = config.with_leaf_capacity(1);
    assert!(matches!(
        BTreeIndex::open_or_create(bad_config, &rel, 0, Datatype::Integer),
        Err(Error::InvalidConfig(_))
    ));
    assert!(!dir.path().join("emp.0").exists());
}

#[test]
fn test_short_record_aborts_bulk_load() {
    let (config, dir) = small_config(4, 4);
    let mut rel = MemRelation::with_keys("emp", 0..20);
    let bad = rel.push(vec![1, 2]);

    let result = BTreeIndex::open_or_create(config, &rel, 0, Datatype::Integer);
    assert!(matches!(
        result,
        Err(Error::AttributeOutOfBounds { rid, offset: 0, len: 2 }) if rid == bad
    ));
    assert!(!dir.path().join("emp.0").exists());
}

#[test]
fn test_attribute_offset_selects_key() {
    let (config, _dir) = small_config(4, 4);
    // with_keys stores !key at offset 4.
    let rel = MemRelation::with_keys("emp", 0..50);
    let mut index = BTreeIndex::open_or_create(config, &rel, 4, Datatype::Integer).unwrap();
    assert_eq!(index.index_name(), "emp.4");

    let rids = scan_rids(&mut index, !9, Operator::Gte, !0, Operator::Lte).unwrap();
    let expected: Vec<RecordId> = (0..10).rev().map(rid_for).collect();
    assert_eq!(rids, expected);
}

#[test]
fn test_bulk_load_from_heap_file() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut heap = HeapFile::create(dir.path(), "people", 16).unwrap();
    for id in 0..3000i32 {
        let badge = (id * 7) % 3000;
        let mut record = id.to_le_bytes().to_vec();
        record.extend_from_slice(&badge.to_le_bytes());
        record.extend_from_slice(b"name-field");
        heap.insert_record(&record).unwrap();
    }

    let config = IndexConfig::new(dir.path()).with_pool_size(32);
    let mut index = BTreeIndex::open_or_create(config, &heap, 4, Datatype::Integer).unwrap();
    assert_eq!(index.verify().unwrap().entry_count, 3000);

    let rids = scan_rids(&mut index, 300, Operator::Gte, 600, Operator::Lt).unwrap();
    assert_eq!(rids.len(), 300);

    let badges: Vec<i32> = rids
        .into_iter()
        .map(|rid| {
            let record = heap.get_record(rid).unwrap();
            i32::from_le_bytes(record[4..8].try_into().unwrap())
        })
        .collect();
    assert_eq!(badges, (300..600).collect::<Vec<_>>());
}

#[test]
fn test_corrupted_index_file_is_detected() {
    let (config, dir) = small_config(4, 4);
    drop(open_index(config.clone(), &MemRelation::with_keys("emp", 0..10)));

    let path = dir.path().join("emp.0");
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    // Flip a byte inside the metadata page body.
    file.seek(SeekFrom::Start(intindex::PAGE_SIZE as u64 + 40)).unwrap();
    file.write_all(&[0xEE]).unwrap();
    drop(file);

    assert!(matches!(
        BTreeIndex::open_or_create(config, &MemRelation::new("emp"), 0, Datatype::Integer),
        Err(Error::ChecksumMismatch(1))
    ));
}

fn init() {
    common::init_tracing();
}
