//! Map for keeping track of which key corresponds to which index in an
//! underlying [`Vec`].

use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Map for keeping track of which key corresponds to which index in an
/// underlying [`Vec`].
///
/// This is useful if we want the flexibility of accessing data with a key but
/// don't want to sacrifice the compact data storage provided by a `Vec`. It
/// also enables us to reorder items in the `Vec` (like doing a swap remove)
/// without invalidating the keys used to access the items.
#[derive(Clone, Debug, Default)]
pub struct KeyIndexMapper<K> {
    indices_for_keys: FxHashMap<K, usize>,
    keys_at_indices: Vec<K>,
}

impl<K> KeyIndexMapper<K>
where
    K: Copy + Hash + Eq + Debug,
{
    /// Creates a new mapper with no keys.
    pub fn new() -> Self {
        Self {
            indices_for_keys: FxHashMap::default(),
            keys_at_indices: Vec::new(),
        }
    }

    /// The number of keys in the mapper.
    pub fn len(&self) -> usize {
        self.keys_at_indices.len()
    }

    /// Whether the mapper has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys_at_indices.is_empty()
    }

    /// Whether an entry for the given key exists.
    pub fn contains_key(&self, key: K) -> bool {
        self.indices_for_keys.contains_key(&key)
    }

    /// Returns the index corresponding to the given key, or [`None`] if the
    /// key is not present.
    pub fn get(&self, key: K) -> Option<usize> {
        self.indices_for_keys.get(&key).copied()
    }

    /// Returns an iterator over the keys in index order.
    pub fn key_at_each_idx(&self) -> impl Iterator<Item = K> + '_ {
        self.keys_at_indices.iter().copied()
    }

    /// Adds the given key to the mapper, assigning it the next free index.
    ///
    /// # Panics
    /// If an entry for the key already exists.
    pub fn push_key(&mut self, key: K) {
        let idx = self.keys_at_indices.len();
        let existing = self.indices_for_keys.insert(key, idx);
        assert!(
            existing.is_none(),
            "Tried to add existing key {key:?} to mapper"
        );
        self.keys_at_indices.push(key);
    }

    /// Removes the key at the given index by moving the last key into its
    /// place, mirroring a `swap_remove` on the underlying `Vec`.
    ///
    /// # Panics
    /// If the index is out of bounds.
    pub fn swap_remove_key_at_idx(&mut self, idx: usize) -> K {
        let removed_key = self.keys_at_indices.swap_remove(idx);
        self.indices_for_keys.remove(&removed_key);
        if let Some(&moved_key) = self.keys_at_indices.get(idx) {
            *self.indices_for_keys.get_mut(&moved_key).unwrap() = idx;
        }
        removed_key
    }

    /// Removes the given key if present, moving the last key into its index.
    /// Returns the index the key occupied, or [`None`] if it was not present.
    pub fn try_swap_remove_key(&mut self, key: K) -> Option<usize> {
        let idx = self.get(key)?;
        self.swap_remove_key_at_idx(idx);
        Some(idx)
    }

    /// Removes all keys from the mapper.
    pub fn clear(&mut self) {
        self.indices_for_keys.clear();
        self.keys_at_indices.clear();
    }
}
