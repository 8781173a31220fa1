//! Property tests: random key sets against a sorted model.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{open_index, rid_for, small_config, MemRelation};
use intindex::{Error, Operator, PageId, RecordId};
use proptest::prelude::*;

fn rid(key: i32) -> RecordId {
    RecordId::new(PageId::new(key as u32), (key as u32 % 1000) as u16)
}

fn lower_op(inclusive: bool) -> Operator {
    if inclusive {
        Operator::Gte
    } else {
        Operator::Gt
    }
}

fn upper_op(inclusive: bool) -> Operator {
    if inclusive {
        Operator::Lte
    } else {
        Operator::Lt
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_inserts_scan_back_in_order(
        keys in prop::collection::btree_set(-5_000i32..5_000, 1..600),
        leaf in 2usize..9,
        internal in 2usize..7,
    ) {
        let (config, _dir) = small_config(leaf, internal);
        let mut index = open_index(config, &MemRelation::new("prop"));

        // Insert in a scrambled but reproducible order.
        let mut order: Vec<i32> = keys.iter().copied().collect();
        order.sort_by_key(|k| (k.wrapping_mul(40_503)) & 0xFFFF);
        for (i, &key) in order.iter().enumerate() {
            index.insert_entry(key, rid(key)).unwrap();
            if i % 97 == 0 {
                index.verify().unwrap();
            }
        }

        let shape = index.verify().unwrap();
        prop_assert_eq!(shape.entry_count, keys.len());
        prop_assert_eq!(index.buffer_pool().pinned_frame_count(), 0);

        let min = *keys.iter().next().unwrap();
        let max = *keys.iter().next_back().unwrap();
        index.start_scan(min, Operator::Gte, max, Operator::Lte).unwrap();
        let rids: Vec<RecordId> = index.scan_iter().collect::<Result<_, _>>().unwrap();
        index.end_scan().unwrap();
        prop_assert_eq!(rids, keys.iter().map(|&k| rid(k)).collect::<Vec<_>>());
    }

    #[test]
    fn sub_range_scans_match_model(
        keys in prop::collection::btree_set(0i32..2_000, 50..400),
        pick in 0usize..50,
        width in 0i32..300,
    ) {
        let (config, _dir) = small_config(4, 3);
        let rel = MemRelation::new("range");
        let mut index = open_index(config, &rel);
        for &key in &keys {
            index.insert_entry(key, rid(key)).unwrap();
        }

        // Start on a stored key so the located leaf always matches.
        let low = *keys.iter().nth(pick % keys.len()).unwrap();
        let high = low.saturating_add(width);
        let model: BTreeSet<i32> = keys.range(low..=high).copied().collect();

        index.start_scan(low, Operator::Gte, high, Operator::Lte).unwrap();
        let mut got = Vec::new();
        while let Some(r) = index.scan_next().unwrap() {
            got.push(r);
        }
        index.end_scan().unwrap();
        prop_assert_eq!(got, model.iter().map(|&k| rid(k)).collect::<Vec<_>>());
    }

    #[test]
    fn repeated_keys_scan_like_a_multimap(
        keys in prop::collection::vec(-20i32..20, 1..400),
        leaf in 2usize..7,
        internal in 2usize..6,
        low in -22i32..22,
        width in 0i32..20,
        low_inclusive in any::<bool>(),
        high_inclusive in any::<bool>(),
    ) {
        let (config, _dir) = small_config(leaf, internal);
        let mut index = open_index(config, &MemRelation::new("multi"));

        let mut model: BTreeMap<i32, Vec<RecordId>> = BTreeMap::new();
        for (i, &key) in keys.iter().enumerate() {
            let rid = rid_for(i);
            index.insert_entry(key, rid).unwrap();
            model.entry(key).or_default().push(rid);
        }
        let shape = index.verify().unwrap();
        prop_assert_eq!(shape.entry_count, keys.len());

        let high = low + width;
        let (low_op, high_op) = (lower_op(low_inclusive), upper_op(high_inclusive));
        let expected: Vec<RecordId> = model
            .iter()
            .filter(|(&k, _)| {
                (if low_inclusive { k >= low } else { k > low })
                    && (if high_inclusive { k <= high } else { k < high })
            })
            .flat_map(|(_, rids)| rids.iter().copied())
            .collect();

        match index.start_scan(low, low_op, high, high_op) {
            Ok(()) => {
                let got: Vec<RecordId> = index.scan_iter().collect::<Result<_, _>>().unwrap();
                index.end_scan().unwrap();
                prop_assert_eq!(got, expected);
            }
            Err(Error::NoSuchKeyFound) => prop_assert!(expected.is_empty()),
            Err(e) => prop_assert!(false, "unexpected error {}", e),
        }
        prop_assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
    }
}
