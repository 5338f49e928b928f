//! Atomic write batches.

use crate::bounds::Bounds;
use crate::sorted;
use crate::value::{KeyValuePair, Tuple};

/// A batch of writes applied atomically: pairs to set and keys to remove.
///
/// Both sides stay sorted, and a key appears at most once across the two.
/// Setting a key cancels a pending remove of the same key and vice versa,
/// so "last call wins" within a batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Writes<V> {
    set: Vec<KeyValuePair<V>>,
    remove: Vec<Tuple>,
}

impl<V> Default for Writes<V> {
    fn default() -> Self {
        Self {
            set: Vec::new(),
            remove: Vec::new(),
        }
    }
}

impl<V> Writes<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` should be set to `value`.
    pub fn set(&mut self, key: Tuple, value: V) {
        sorted::remove_tuple(&mut self.remove, &key);
        sorted::upsert_pair(&mut self.set, key, value);
    }

    /// Record that `key` should be removed.
    pub fn remove(&mut self, key: Tuple) {
        sorted::remove_pair(&mut self.set, &key);
        sorted::insert_tuple(&mut self.remove, key);
    }

    /// The pairs to set, sorted by key.
    #[must_use]
    pub fn sets(&self) -> &[KeyValuePair<V>] {
        &self.set
    }

    /// The keys to remove, sorted.
    #[must_use]
    pub fn removes(&self) -> &[Tuple] {
        &self.remove
    }

    /// The buffered value for `key`: `Some(Some(v))` if set,
    /// `Some(None)` if removed, `None` if untouched.
    #[must_use]
    pub fn get(&self, key: &Tuple) -> Option<Option<&V>> {
        if let Some(value) = sorted::get_pair(&self.set, key) {
            return Some(Some(value));
        }
        if sorted::search_tuples(&self.remove, key).is_found() {
            return Some(None);
        }
        None
    }

    /// Every key touched by this batch, in no particular order across the
    /// set/remove partition.
    pub fn keys(&self) -> impl Iterator<Item = &Tuple> {
        self.set.iter().map(|pair| &pair.key).chain(self.remove.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len() + self.remove.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    pub fn clear(&mut self) {
        self.set.clear();
        self.remove.clear();
    }

    /// Split into the sorted set pairs and remove keys.
    #[must_use]
    pub fn into_parts(self) -> (Vec<KeyValuePair<V>>, Vec<Tuple>) {
        (self.set, self.remove)
    }

    /// Rebuild from parts. The caller guarantees both sides are sorted and
    /// share no key; used by the subspace rewrites, which preserve both.
    #[must_use]
    pub(crate) fn from_parts(set: Vec<KeyValuePair<V>>, remove: Vec<Tuple>) -> Self {
        Self { set, remove }
    }
}

impl<V: Clone> Writes<V> {
    /// The subset of this batch whose keys fall inside `bounds`, with the
    /// set/remove partition preserved.
    #[must_use]
    pub fn restricted_to(&self, bounds: &Bounds) -> Self {
        Self {
            set: self
                .set
                .iter()
                .filter(|pair| bounds.contains(&pair.key))
                .cloned()
                .collect(),
            remove: self
                .remove
                .iter()
                .filter(|key| bounds.contains(key))
                .cloned()
                .collect(),
        }
    }
}
