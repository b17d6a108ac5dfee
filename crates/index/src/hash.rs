//! Hash index for secondary-key lookups.
//!
//! Each bucket is an insertion-ordered set, so adding or dropping one entry
//! costs O(1) however many rows share the key. Removal swaps the last entry
//! into the freed position. Empty buckets are dropped so that
//! `contains_key` reflects live rows only.

use crate::traits::{Index, IndexError};
use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::HashMap;
use indexmap::IndexSet;

type Bucket<V> = IndexSet<V, DefaultHashBuilder>;

/// Buckets of entries keyed by cell value.
///
/// A unique index refuses a second entry under the same key. There are no
/// range queries.
#[derive(Clone, Debug)]
pub struct HashIndex<K, V> {
    buckets: HashMap<K, Bucket<V>>,
    unique: bool,
    entries: usize,
}

impl<K: Eq + Hash + Clone, V: Eq + Hash + Clone> HashIndex<K, V> {
    pub fn new(unique: bool) -> Self {
        Self {
            buckets: HashMap::new(),
            unique,
            entries: 0,
        }
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Entries filed under `key`, borrowed.
    pub fn bucket(&self, key: &K) -> impl Iterator<Item = &V> + '_ {
        self.buckets.get(key).into_iter().flatten()
    }

    /// Keys with at least one entry.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.buckets.keys()
    }

    pub fn contains_entry(&self, key: &K, entry: &V) -> bool {
        self.buckets.get(key).is_some_and(|b| b.contains(entry))
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }
}

impl<K: Eq + Hash + Clone, V: Eq + Hash + Clone> Index<K, V> for HashIndex<K, V> {
    fn add(&mut self, key: K, entry: V) -> Result<(), IndexError> {
        let bucket = self.buckets.entry(key).or_default();
        if bucket.contains(&entry) {
            return Ok(());
        }
        if self.unique && !bucket.is_empty() {
            return Err(IndexError::DuplicateKey);
        }
        bucket.insert(entry);
        self.entries += 1;
        Ok(())
    }

    fn set(&mut self, key: K, entry: V) {
        let mut bucket = Bucket::default();
        bucket.insert(entry);
        let replaced = self.buckets.insert(key, bucket).map_or(0, |b| b.len());
        self.entries = self.entries - replaced + 1;
    }

    fn get(&self, key: &K) -> Vec<V> {
        self.bucket(key).cloned().collect()
    }

    fn remove(&mut self, key: &K, entry: Option<&V>) {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return;
        };
        match entry {
            Some(entry) => {
                if bucket.swap_remove(entry) {
                    self.entries -= 1;
                }
            }
            None => {
                self.entries -= bucket.len();
                bucket.clear();
            }
        }
        if bucket.is_empty() {
            self.buckets.remove(key);
        }
    }

    fn contains_key(&self, key: &K) -> bool {
        self.buckets.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.entries = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_hash_index_unique() {
        let mut index: HashIndex<i32, u64> = HashIndex::new(true);

        assert!(index.add(1, 100).is_ok());
        assert!(index.add(2, 200).is_ok());
        assert_eq!(index.add(1, 101), Err(IndexError::DuplicateKey));

        assert_eq!(index.get(&1), vec![100]);
        assert_eq!(index.get(&3), Vec::<u64>::new());
    }

    #[test]
    fn test_hash_index_non_unique() {
        let mut index: HashIndex<i32, u64> = HashIndex::new(false);

        index.add(1, 100).unwrap();
        index.add(1, 101).unwrap();
        index.add(2, 200).unwrap();

        assert_eq!(index.get(&1), vec![100, 101]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.key_count(), 2);
    }

    #[test]
    fn test_hash_index_add_is_idempotent() {
        let mut index: HashIndex<&str, u64> = HashIndex::new(false);
        index.add("a", 1).unwrap();
        index.add("a", 1).unwrap();
        assert_eq!(index.get(&"a"), vec![1]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_hash_index_set() {
        let mut index: HashIndex<i32, u64> = HashIndex::new(false);

        index.set(1, 100);
        index.set(1, 101);

        assert_eq!(index.get(&1), vec![101]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_hash_index_remove() {
        let mut index: HashIndex<i32, u64> = HashIndex::new(false);

        index.add(1, 100).unwrap();
        index.add(1, 101).unwrap();
        index.add(2, 200).unwrap();

        index.remove(&1, Some(&100));
        assert_eq!(index.get(&1), vec![101]);

        index.remove(&1, None);
        assert!(!index.contains_key(&1));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_hash_index_drops_empty_buckets() {
        let mut index: HashIndex<i32, u64> = HashIndex::new(false);
        index.add(1, 100).unwrap();
        index.remove(&1, Some(&100));
        assert!(!index.contains_key(&1));
        assert!(index.is_empty());
    }

    #[test]
    fn test_hash_index_relocate() {
        let mut index: HashIndex<&str, u64> = HashIndex::new(false);
        index.add("pending", 7).unwrap();
        index.add("pending", 9).unwrap();

        index.relocate(&"pending", "shipped", 7);

        assert_eq!(index.get(&"pending"), vec![9]);
        assert_eq!(index.get(&"shipped"), vec![7]);
        assert!(index.contains_entry(&"shipped", &7));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_hash_index_shared_key_bulk() {
        let mut index: HashIndex<&str, u64> = HashIndex::new(false);
        for id in 0..10_000 {
            index.add("pending", id).unwrap();
        }
        for id in (0..10_000).step_by(2) {
            index.remove(&"pending", Some(&id));
        }
        assert_eq!(index.len(), 5_000);
        assert!(index.contains_entry(&"pending", &9_999));
        assert!(!index.contains_entry(&"pending", &0));

        index.remove(&"pending", Some(&12_345));
        assert_eq!(index.len(), 5_000);
    }

    #[test]
    fn test_hash_index_clear() {
        let mut index: HashIndex<i32, u64> = HashIndex::new(true);

        index.add(1, 100).unwrap();
        index.add(2, 200).unwrap();
        index.clear();

        assert!(index.is_empty());
        assert_eq!(index.keys().count(), 0);
    }
}
