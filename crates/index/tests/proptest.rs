//! Property-based tests for horizon-index using proptest.

use horizon_index::{HashIndex, Index};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Op {
    Add(u8, u32),
    Remove(u8, u32),
    Relocate(u8, u8, u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, 0u32..32).prop_map(|(k, e)| Op::Add(k, e)),
        (0u8..8, 0u32..32).prop_map(|(k, e)| Op::Remove(k, e)),
        (0u8..8, 0u8..8, 0u32..32).prop_map(|(a, b, e)| Op::Relocate(a, b, e)),
    ]
}

proptest! {
    /// The index agrees with a naive model after any sequence of operations.
    #[test]
    fn hash_index_matches_model(ops in prop::collection::vec(op(), 1..200)) {
        let mut index: HashIndex<u8, u32> = HashIndex::new(false);
        let mut model: HashMap<u8, Vec<u32>> = HashMap::new();

        for op in ops {
            match op {
                Op::Add(k, e) => {
                    index.add(k, e).unwrap();
                    let bucket = model.entry(k).or_default();
                    if !bucket.contains(&e) {
                        bucket.push(e);
                    }
                }
                Op::Remove(k, e) => {
                    index.remove(&k, Some(&e));
                    if let Some(bucket) = model.get_mut(&k) {
                        bucket.retain(|x| *x != e);
                    }
                }
                Op::Relocate(a, b, e) => {
                    index.relocate(&a, b, e);
                    if let Some(bucket) = model.get_mut(&a) {
                        bucket.retain(|x| *x != e);
                    }
                    let bucket = model.entry(b).or_default();
                    if !bucket.contains(&e) {
                        bucket.push(e);
                    }
                }
            }
        }

        model.retain(|_, v| !v.is_empty());
        let total: usize = model.values().map(|v| v.len()).sum();
        prop_assert_eq!(index.len(), total);
        prop_assert_eq!(index.key_count(), model.len());
        for (k, bucket) in &model {
            let mut entries = index.get(k);
            entries.sort_unstable();
            let mut expected = bucket.clone();
            expected.sort_unstable();
            prop_assert_eq!(entries, expected);
        }
    }

    /// A unique index never holds two entries under one key.
    #[test]
    fn unique_index_single_entry(keys in prop::collection::vec(0u8..16, 1..100)) {
        let mut index: HashIndex<u8, usize> = HashIndex::new(true);
        for (i, k) in keys.iter().enumerate() {
            let _ = index.add(*k, i);
        }
        for k in index.keys().copied().collect::<Vec<_>>() {
            prop_assert_eq!(index.get(&k).len(), 1);
        }
    }
}
