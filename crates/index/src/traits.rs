//! Index trait definitions for the Horizon engine.
//!
//! This module defines the core `Index` trait that index implementations
//! satisfy. Keys are cell values; entries identify rows.

use alloc::vec::Vec;

/// Core index operations.
pub trait Index<K, V> {
    /// Adds an entry under `key`. Unique indexes refuse a second entry.
    fn add(&mut self, key: K, entry: V) -> Result<(), IndexError>;

    /// Replaces every entry under `key` with `entry`.
    fn set(&mut self, key: K, entry: V);

    /// Gets all entries for a key.
    fn get(&self, key: &K) -> Vec<V>;

    /// Removes one entry, or every entry when `entry` is None.
    fn remove(&mut self, key: &K, entry: Option<&V>);

    /// Moves `entry` from the bucket of `old_key` to the bucket of `new_key`.
    fn relocate(&mut self, old_key: &K, new_key: K, entry: V) {
        self.remove(old_key, Some(&entry));
        self.set_or_add(new_key, entry);
    }

    /// Adds an entry, ignoring unique-key violations.
    fn set_or_add(&mut self, key: K, entry: V) {
        let _ = self.add(key, entry);
    }

    /// Checks if the index contains a key.
    fn contains_key(&self, key: &K) -> bool;

    /// Returns the number of entries.
    fn len(&self) -> usize;

    /// Returns true if the index has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries.
    fn clear(&mut self);
}

/// Index errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// A unique index already holds an entry under the key.
    #[error("Duplicate key in unique index")]
    DuplicateKey,
}
