//! Binary-search primitives over sorted in-memory arrays.
//!
//! Everything here reduces to one binary search plus a constant-time
//! splice. These helpers back the in-memory storage backend, transaction
//! write buffers and the listener registry, so they operate on plain
//! `Vec`s rather than introducing a container type.

use std::cmp::Ordering;

use crate::bounds::Bounds;
use crate::value::{KeyValuePair, Tuple};

/// Result of a binary search over a sorted array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// Exact match at this index.
    Found(usize),
    /// No match; inserting at this index preserves the order.
    Closest(usize),
}

impl SearchResult {
    /// The index regardless of whether the probe matched.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Found(i) | Self::Closest(i) => i,
        }
    }

    /// Whether the probe matched exactly.
    #[must_use]
    pub const fn is_found(self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Binary search with a caller-supplied comparator.
///
/// `probe` reports how each item compares against the target: return
/// `Less` for items before it, `Greater` for items after it.
pub fn search_by<T>(items: &[T], mut probe: impl FnMut(&T) -> Ordering) -> SearchResult {
    match items.binary_search_by(|item| probe(item)) {
        Ok(i) => SearchResult::Found(i),
        Err(i) => SearchResult::Closest(i),
    }
}

/// Binary search for a key in a sorted pair array.
pub fn search_pairs<V>(pairs: &[KeyValuePair<V>], key: &Tuple) -> SearchResult {
    search_by(pairs, |pair| pair.key.cmp(key))
}

/// Binary search for a tuple in a sorted tuple array.
pub fn search_tuples(tuples: &[Tuple], key: &Tuple) -> SearchResult {
    search_by(tuples, |t| t.cmp(key))
}

/// Insert or replace the pair for `key`, keeping the array sorted.
pub fn upsert_pair<V>(pairs: &mut Vec<KeyValuePair<V>>, key: Tuple, value: V) {
    match search_pairs(pairs, &key) {
        SearchResult::Found(i) => pairs[i].value = value,
        SearchResult::Closest(i) => pairs.insert(i, KeyValuePair::new(key, value)),
    }
}

/// Remove the pair for `key` if present.
pub fn remove_pair<V>(pairs: &mut Vec<KeyValuePair<V>>, key: &Tuple) -> Option<KeyValuePair<V>> {
    match search_pairs(pairs, key) {
        SearchResult::Found(i) => Some(pairs.remove(i)),
        SearchResult::Closest(_) => None,
    }
}

/// Look up the value for `key`.
pub fn get_pair<'a, V>(pairs: &'a [KeyValuePair<V>], key: &Tuple) -> Option<&'a V> {
    match search_pairs(pairs, key) {
        SearchResult::Found(i) => Some(&pairs[i].value),
        SearchResult::Closest(_) => None,
    }
}

/// Insert a tuple if absent, keeping the array sorted.
pub fn insert_tuple(tuples: &mut Vec<Tuple>, key: Tuple) {
    if let SearchResult::Closest(i) = search_tuples(tuples, &key) {
        tuples.insert(i, key);
    }
}

/// Remove a tuple if present.
pub fn remove_tuple(tuples: &mut Vec<Tuple>, key: &Tuple) -> bool {
    match search_tuples(tuples, key) {
        SearchResult::Found(i) => {
            tuples.remove(i);
            true
        }
        SearchResult::Closest(_) => false,
    }
}

/// The `[start, end)` index range of keys within `bounds`, for any array
/// sorted by the key that `key_of` extracts.
pub fn range_of<T>(items: &[T], key_of: impl Fn(&T) -> &Tuple, bounds: &Bounds) -> (usize, usize) {
    let start = match &bounds.lower {
        None => 0,
        Some(bound) => match search_by(items, |item| key_of(item).cmp(&bound.key)) {
            SearchResult::Found(i) => {
                if bound.inclusive {
                    i
                } else {
                    i + 1
                }
            }
            SearchResult::Closest(i) => i,
        },
    };
    let end = match &bounds.upper {
        None => items.len(),
        Some(bound) => match search_by(items, |item| key_of(item).cmp(&bound.key)) {
            SearchResult::Found(i) => {
                if bound.inclusive {
                    i + 1
                } else {
                    i
                }
            }
            SearchResult::Closest(i) => i,
        },
    };
    (start, end.max(start))
}

/// Range scan over a sorted pair array.
///
/// `reverse` flips the slice before `limit` truncates it, so a reverse
/// scan returns the *last* `limit` pairs of the range, descending.
pub fn scan_pairs<V: Clone>(
    pairs: &[KeyValuePair<V>],
    bounds: &Bounds,
    reverse: bool,
    limit: Option<usize>,
) -> Vec<KeyValuePair<V>> {
    let (start, end) = range_of(pairs, |pair| &pair.key, bounds);
    let mut out: Vec<KeyValuePair<V>> = pairs[start..end].to_vec();
    if reverse {
        out.reverse();
    }
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}

/// Range scan over a sorted tuple array.
pub fn scan_tuples(
    tuples: &[Tuple],
    bounds: &Bounds,
    reverse: bool,
    limit: Option<usize>,
) -> Vec<Tuple> {
    let (start, end) = range_of(tuples, |t| t, bounds);
    let mut out: Vec<Tuple> = tuples[start..end].to_vec();
    if reverse {
        out.reverse();
    }
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}
