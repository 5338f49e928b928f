//! Prefix rewrites for subspace-scoped views.
//!
//! A subspace client holds an immutable prefix tuple `P`. Callers see keys
//! without `P`; storage sees keys with `P` prepended. These rewrites are
//! pure functions over tuples, scan args and write batches, so the client
//! layer stays a thin shell around them.
//!
//! Prepending one fixed prefix to every key of a sorted collection does
//! not change the relative order, so the batch/pair rewrites map the
//! vectors directly instead of re-sorting.

use crate::bounds::ScanArgs;
use crate::value::{KeyValuePair, Tuple};
use crate::writes::Writes;

/// `prefix ++ key`.
#[must_use]
pub fn prepend_prefix(prefix: &Tuple, key: &Tuple) -> Tuple {
    prefix.concat(key)
}

/// Strip `prefix` from a key that is known to carry it.
///
/// Storage hands a subspace client only keys inside its prefix range, so a
/// mismatch here means the backend violated its contract.
#[must_use]
pub fn remove_prefix(prefix: &Tuple, key: &Tuple) -> Option<Tuple> {
    key.strip_prefix(prefix)
}

/// Rewrite scan args from subspace-relative to absolute form.
///
/// Each of `prefix`/`gt`/`gte`/`lt`/`lte` gets the subspace prefix
/// prepended; a scan with no bounds at all becomes a scan of everything
/// under the subspace prefix. `limit` and `reverse` pass through.
#[must_use]
pub fn prepend_prefix_to_scan_args(prefix: &Tuple, args: &ScanArgs) -> ScanArgs {
    if prefix.is_empty() {
        return args.clone();
    }
    let mut out = args.clone();
    match &args.prefix {
        Some(inner) => out.prefix = Some(prefix.concat(inner)),
        None => out.prefix = Some(prefix.clone()),
    }
    // The relative endpoints stay relative: `bounds()` resolves them
    // against the combined prefix.
    out
}

/// Prepend `prefix` to every key of a batch.
#[must_use]
pub fn prepend_prefix_to_writes<V>(prefix: &Tuple, writes: Writes<V>) -> Writes<V> {
    if prefix.is_empty() {
        return writes;
    }
    let (set, remove) = writes.into_parts();
    Writes::from_parts(
        set.into_iter()
            .map(|pair| KeyValuePair::new(prefix.concat(&pair.key), pair.value))
            .collect(),
        remove.into_iter().map(|key| prefix.concat(&key)).collect(),
    )
}

/// Strip `prefix` from every key of a batch. Entries outside the prefix
/// are dropped; callers restrict the batch to the subspace range first.
#[must_use]
pub fn remove_prefix_from_writes<V>(prefix: &Tuple, writes: Writes<V>) -> Writes<V> {
    if prefix.is_empty() {
        return writes;
    }
    let (set, remove) = writes.into_parts();
    Writes::from_parts(
        set.into_iter()
            .filter_map(|pair| {
                pair.key
                    .strip_prefix(prefix)
                    .map(|key| KeyValuePair::new(key, pair.value))
            })
            .collect(),
        remove
            .into_iter()
            .filter_map(|key| key.strip_prefix(prefix))
            .collect(),
    )
}

/// Strip `prefix` from every pair of a scan result.
#[must_use]
pub fn remove_prefix_from_pairs<V>(
    prefix: &Tuple,
    pairs: Vec<KeyValuePair<V>>,
) -> Vec<KeyValuePair<V>> {
    if prefix.is_empty() {
        return pairs;
    }
    pairs
        .into_iter()
        .filter_map(|pair| {
            pair.key
                .strip_prefix(prefix)
                .map(|key| KeyValuePair::new(key, pair.value))
        })
        .collect()
}
