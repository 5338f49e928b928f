//! Listener registry and per-commit fan-out.
//!
//! Listeners are indexed by the longest common prefix of their bounds, and
//! the registry is itself a sorted tuple map: the key is
//! `(Array(prefix), Number(id))`, so "all listeners registered at exactly
//! this prefix" is one range scan with the same primitive the rest of the
//! engine uses. Fan-out for a written key walks that key's prefixes from
//! longest to empty, which narrows the candidate set to listeners that are
//! plausibly interested before the exact bounds check runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;
use tupledb_types::{sorted, Bounds, KeyValuePair, ScanArgs, Tuple, Value, Writes};

/// A subscription callback. Invoked once per commit whose writes intersect
/// the subscribed bounds, with the intersecting subset of the batch.
pub type Callback<V> = Arc<dyn Fn(&Writes<V>) + Send + Sync>;

struct Listener<V> {
    id: u64,
    bounds: Bounds,
    callback: Callback<V>,
}

impl<V> Clone for Listener<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            bounds: self.bounds.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Registry of live listeners plus the fan-out computation.
pub(crate) struct ReactivityTracker<V> {
    listeners: Vec<KeyValuePair<Listener<V>>>,
    next_id: u64,
}

impl<V> Default for ReactivityTracker<V> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn registry_key(prefix: &Tuple, id: u64) -> Tuple {
    Tuple::new()
        .push(Value::Array(prefix.as_slice().to_vec()))
        .push(id as f64)
}

/// Bounds selecting exactly the registry keys for one prefix.
fn registry_range(prefix: &Tuple) -> Bounds {
    let slot = Value::Array(prefix.as_slice().to_vec());
    ScanArgs::new()
        .gte(Tuple::new().push(slot.clone()).push(Value::Min))
        .lte(Tuple::new().push(slot).push(Value::Max))
        .bounds()
}

impl<V: Clone> ReactivityTracker<V> {
    /// Register a listener; returns the registry key used to remove it.
    pub fn subscribe(&mut self, bounds: Bounds, callback: Callback<V>) -> Tuple {
        let id = self.next_id;
        self.next_id += 1;
        let prefix = bounds.common_prefix();
        let key = registry_key(&prefix, id);
        trace!(listener = id, prefix = %prefix, "subscribe");
        sorted::upsert_pair(
            &mut self.listeners,
            key.clone(),
            Listener {
                id,
                bounds,
                callback,
            },
        );
        key
    }

    /// Remove a listener by its registry key. Idempotent.
    pub fn unsubscribe(&mut self, key: &Tuple) -> bool {
        sorted::remove_pair(&mut self.listeners, key).is_some()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Bucket a committed batch by interested listener.
    ///
    /// The result preserves registration order across listeners, and each
    /// bucket preserves the batch's set/remove partition restricted to the
    /// listener's bounds.
    pub fn emits_for(&self, writes: &Writes<V>) -> Vec<(Callback<V>, Writes<V>)> {
        let mut buckets: BTreeMap<u64, (Callback<V>, Writes<V>)> = BTreeMap::new();

        for pair in writes.sets() {
            self.fan_out(&pair.key, &mut buckets, &|bucket| {
                bucket.set(pair.key.clone(), pair.value.clone());
            });
        }
        for key in writes.removes() {
            self.fan_out(key, &mut buckets, &|bucket| {
                bucket.remove(key.clone());
            });
        }

        trace!(
            touched = writes.len(),
            notified = buckets.len(),
            "reactivity fan-out"
        );
        buckets.into_values().collect()
    }

    fn fan_out(
        &self,
        key: &Tuple,
        buckets: &mut BTreeMap<u64, (Callback<V>, Writes<V>)>,
        apply: &dyn Fn(&mut Writes<V>),
    ) {
        for prefix_len in (0..=key.len()).rev() {
            let prefix = key.prefix(prefix_len);
            let range = registry_range(&prefix);
            for entry in sorted::scan_pairs(&self.listeners, &range, false, None) {
                let listener = entry.value;
                if listener.bounds.contains(key) {
                    let (_, bucket) = buckets.entry(listener.id).or_insert_with(|| {
                        (Arc::clone(&listener.callback), Writes::new())
                    });
                    apply(bucket);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tupledb_types::tuple;

    use super::*;

    type Recorded = Arc<Mutex<Vec<Writes<i64>>>>;

    fn recording() -> (Recorded, Callback<i64>) {
        let seen: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: Callback<i64> = Arc::new(move |writes: &Writes<i64>| {
            sink.lock().unwrap().push(writes.clone());
        });
        (seen, callback)
    }

    fn score_bounds() -> Bounds {
        ScanArgs::new()
            .gt(tuple!["score"])
            .lte(tuple!["score"].push(Value::Max))
            .bounds()
    }

    #[test]
    fn listener_receives_intersecting_writes_once() {
        let mut tracker = ReactivityTracker::default();
        let (seen, callback) = recording();
        tracker.subscribe(score_bounds(), callback);

        let mut writes = Writes::new();
        writes.set(tuple!["score", "chet"], 2);
        writes.set(tuple!["other"], 9);

        for (callback, batch) in tracker.emits_for(&writes) {
            callback(&batch);
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].sets().len(), 1);
        assert_eq!(seen[0].sets()[0].key, tuple!["score", "chet"]);
        assert_eq!(seen[0].sets()[0].value, 2);
        assert!(seen[0].removes().is_empty());
    }

    #[test]
    fn non_intersecting_writes_do_not_notify() {
        let mut tracker = ReactivityTracker::default();
        let (seen, callback) = recording();
        tracker.subscribe(score_bounds(), callback);

        let mut writes = Writes::new();
        writes.set(tuple!["total"], 3);
        assert!(tracker.emits_for(&writes).is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn removes_are_delivered_in_partition() {
        let mut tracker = ReactivityTracker::default();
        let (seen, callback) = recording();
        tracker.subscribe(score_bounds(), callback);

        let mut writes = Writes::new();
        writes.set(tuple!["score", "a"], 1);
        writes.remove(tuple!["score", "b"]);
        for (callback, batch) in tracker.emits_for(&writes) {
            callback(&batch);
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].sets().len(), 1);
        assert_eq!(seen[0].removes(), &[tuple!["score", "b"]]);
    }

    #[test]
    fn unbounded_listener_sees_everything() {
        let mut tracker = ReactivityTracker::default();
        let (seen, callback) = recording();
        tracker.subscribe(Bounds::default(), callback);

        let mut writes = Writes::new();
        writes.set(tuple!["a"], 1);
        writes.set(tuple![], 0);
        for (callback, batch) in tracker.emits_for(&writes) {
            callback(&batch);
        }
        assert_eq!(seen.lock().unwrap()[0].sets().len(), 2);
    }

    #[test]
    fn buckets_follow_registration_order() {
        let mut tracker = ReactivityTracker::default();
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        tracker.subscribe(
            Bounds::default(),
            Arc::new(move |_: &Writes<i64>| o.lock().unwrap().push("first")),
        );
        let o = Arc::clone(&order);
        tracker.subscribe(
            score_bounds(),
            Arc::new(move |_: &Writes<i64>| o.lock().unwrap().push("second")),
        );

        let mut writes = Writes::new();
        writes.set(tuple!["score", "x"], 1);
        for (callback, batch) in tracker.emits_for(&writes) {
            callback(&batch);
        }
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut tracker = ReactivityTracker::default();
        let (seen, callback) = recording();
        let key = tracker.subscribe(score_bounds(), callback);
        assert_eq!(tracker.len(), 1);

        assert!(tracker.unsubscribe(&key));
        assert!(!tracker.unsubscribe(&key));
        assert_eq!(tracker.len(), 0);

        let mut writes = Writes::new();
        writes.set(tuple!["score", "x"], 1);
        assert!(tracker.emits_for(&writes).is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn listeners_at_different_depths() {
        let mut tracker = ReactivityTracker::default();
        let (seen_deep, cb_deep) = recording();
        let (seen_shallow, cb_shallow) = recording();

        tracker.subscribe(
            ScanArgs::new().prefix(tuple!["game", "g1"]).bounds(),
            cb_deep,
        );
        tracker.subscribe(ScanArgs::new().prefix(tuple!["game"]).bounds(), cb_shallow);

        let mut writes = Writes::new();
        writes.set(tuple!["game", "g1", "total"], 3);
        for (callback, batch) in tracker.emits_for(&writes) {
            callback(&batch);
        }
        assert_eq!(seen_deep.lock().unwrap().len(), 1);
        assert_eq!(seen_shallow.lock().unwrap().len(), 1);

        let mut writes = Writes::new();
        writes.set(tuple!["game", "g2", "total"], 4);
        for (callback, batch) in tracker.emits_for(&writes) {
            callback(&batch);
        }
        assert_eq!(seen_deep.lock().unwrap().len(), 1);
        assert_eq!(seen_shallow.lock().unwrap().len(), 2);
    }
}
