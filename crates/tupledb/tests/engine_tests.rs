//! End-to-end behavior of the engine through the public API.

use std::sync::{Arc, Mutex};

use tupledb::{
    transactionally, tuple, MemoryStorage, ScanArgs, TupleClient, TupleDatabase, Value, Writes,
};

fn client() -> TupleClient<MemoryStorage<i64>> {
    TupleClient::new(TupleDatabase::new(MemoryStorage::new()))
}

#[test]
fn composite_keys_sort_elementwise() {
    let client = client();
    let tx = client.transact();
    tx.set(&tuple!["jonathan", "smith"], 1).unwrap();
    tx.set(&tuple!["chet", "corcos"], 2).unwrap();
    tx.set(&tuple!["jon", "smith"], 3).unwrap();
    tx.commit().unwrap();

    let rows = client.scan(&ScanArgs::new()).unwrap();
    assert_eq!(
        rows.iter().map(|p| p.key.clone()).collect::<Vec<_>>(),
        vec![
            tuple!["chet", "corcos"],
            tuple!["jon", "smith"],
            tuple!["jonathan", "smith"],
        ]
    );
}

#[test]
fn range_scan_between_string_bounds() {
    let client = client();
    let tx = client.transact();
    for (i, key) in [
        tuple!["chet", "corcos"],
        tuple!["joe", "stevens"],
        tuple!["jon", "smith"],
        tuple!["jonathan", "smith"],
        tuple!["zoe", "brown"],
    ]
    .into_iter()
    .enumerate()
    {
        tx.set(&key, i as i64).unwrap();
    }
    tx.commit().unwrap();

    let rows = client
        .scan(&ScanArgs::new().gte(tuple!["j"]).lt(tuple!["k"]))
        .unwrap();
    assert_eq!(
        rows.iter().map(|p| p.key.clone()).collect::<Vec<_>>(),
        vec![
            tuple!["joe", "stevens"],
            tuple!["jon", "smith"],
            tuple!["jonathan", "smith"],
        ]
    );
}

#[test]
fn subscription_receives_exactly_the_intersecting_subset() {
    let client = client();
    let seen: Arc<Mutex<Vec<Writes<i64>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = client
        .subscribe(
            &ScanArgs::new()
                .gt(tuple!["score"])
                .lte(tuple!["score"].push(Value::Max)),
            move |writes| sink.lock().unwrap().push(writes.clone()),
        )
        .unwrap();

    // One commit touching the range and one outside it.
    let mut writes = Writes::new();
    writes.set(tuple!["score", "chet"], 2);
    writes.set(tuple!["unrelated"], 0);
    client.commit(writes).unwrap();

    let mut writes = Writes::new();
    writes.set(tuple!["elsewhere"], 1);
    client.commit(writes).unwrap();

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "exactly one notification");
        assert_eq!(seen[0].sets().len(), 1);
        assert_eq!(seen[0].sets()[0].key, tuple!["score", "chet"]);
        assert_eq!(seen[0].sets()[0].value, 2);
        assert!(seen[0].removes().is_empty());
    }

    subscription.unsubscribe();
    let mut writes = Writes::new();
    writes.set(tuple!["score", "late"], 9);
    client.commit(writes).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn stale_range_read_conflicts_at_commit() {
    let client = client();
    let mut writes = Writes::new();
    writes.set(tuple!["score", "chet"], 1);
    writes.set(tuple!["score", "zoe"], 2);
    client.commit(writes).unwrap();

    // tx1 sums the score range.
    let tx1 = client.transact();
    let sum: i64 = tx1
        .scan(&ScanArgs::new().prefix(tuple!["score"]))
        .unwrap()
        .iter()
        .map(|p| p.value)
        .sum();
    assert_eq!(sum, 3);

    // tx2 writes into that range and commits first.
    let tx2 = client.transact();
    tx2.set(&tuple!["score", "chet"], 5).unwrap();
    tx2.commit().unwrap();

    // tx1's total is now based on a stale read.
    tx1.set(&tuple!["total"], sum).unwrap();
    assert!(tx1.commit().unwrap_err().is_conflict());
    tx1.cancel().unwrap();

    assert_eq!(client.get(&tuple!["total"]).unwrap(), None);
}

#[test]
fn disjoint_transactions_commit_in_any_interleaving() {
    let client = client();

    let tx1 = client.transact();
    let tx2 = client.transact();
    let _ = tx1.scan(&ScanArgs::new().prefix(tuple!["a"])).unwrap();
    let _ = tx2.scan(&ScanArgs::new().prefix(tuple!["b"])).unwrap();
    tx1.set(&tuple!["a", "x"], 1).unwrap();
    tx2.set(&tuple!["b", "y"], 2).unwrap();

    tx2.commit().unwrap();
    tx1.commit().unwrap();

    assert_eq!(client.get(&tuple!["a", "x"]).unwrap(), Some(1));
    assert_eq!(client.get(&tuple!["b", "y"]).unwrap(), Some(2));
}

#[test]
fn subspace_transaction_writes_fully_qualified_keys() {
    let client = client();
    let g1 = client.subspace(&tuple!["game", "g1"]);

    let tx = g1.transact();
    tx.set(&tuple!["total"], 3).unwrap();
    tx.commit().unwrap();

    // The storage-level key carries the subspace prefix.
    assert_eq!(client.get(&tuple!["game", "g1", "total"]).unwrap(), Some(3));
}

#[test]
fn overlay_equals_scan_of_merged_state() {
    // scan(storage ∪ buffer) == overlay(scan(storage), buffer) for a
    // sweep of range shapes.
    let base: Vec<(tupledb::Tuple, i64)> = (0..10).map(|n| (tuple![n * 2], n)).collect();
    let client = client();
    let mut writes = Writes::new();
    for (key, value) in &base {
        writes.set(key.clone(), *value);
    }
    client.commit(writes).unwrap();

    let tx = client.transact();
    tx.set(&tuple![5], 100).unwrap();
    tx.set(&tuple![6], 101).unwrap(); // overwrites storage's 6
    tx.remove(&tuple![8]).unwrap();

    // Reference: the merged state, committed to a second database.
    let reference = client2_with_merged_state();

    for args in [
        ScanArgs::new(),
        ScanArgs::new().gte(tuple![3]).lte(tuple![15]),
        ScanArgs::new().gt(tuple![5]).lt(tuple![9]),
        ScanArgs::new().reverse(true),
    ] {
        let through_tx = tx.scan(&args).unwrap();
        let through_reference = reference.scan(&args).unwrap();
        assert_eq!(through_tx, through_reference, "args: {args:?}");
    }
}

fn client2_with_merged_state() -> TupleClient<MemoryStorage<i64>> {
    let client = client();
    let mut writes = Writes::new();
    for n in 0..10_i64 {
        writes.set(tuple![n * 2], n);
    }
    writes.set(tuple![5], 100);
    writes.set(tuple![6], 101);
    writes.remove(tuple![8]);
    client.commit(writes).unwrap();
    client
}

#[test]
fn secondary_index_maintained_in_same_transaction() {
    // The documented pattern for indexes: write the index key alongside
    // the primary key, transactionally.
    let client = client();
    let total = transactionally(&client, |tx| {
        tx.set(&tuple!["player", "chet"], 2)?;
        tx.set(&tuple!["score-index", 2, "chet"], 0)?;
        Ok(2)
    })
    .unwrap();
    assert_eq!(total, 2);

    let by_score = client
        .scan(&ScanArgs::new().prefix(tuple!["score-index"]))
        .unwrap();
    assert_eq!(by_score.len(), 1);
    assert_eq!(by_score[0].key, tuple![2, "chet"]);
}

#[test]
fn empty_commit_is_fine_and_silent() {
    let client = client();
    let seen = Arc::new(Mutex::new(0_usize));
    let sink = Arc::clone(&seen);
    let _subscription = client
        .subscribe(&ScanArgs::new(), move |_| *sink.lock().unwrap() += 1)
        .unwrap();

    client.commit(Writes::new()).unwrap();
    let tx = client.transact();
    tx.commit().unwrap();

    assert_eq!(*seen.lock().unwrap(), 0);
}
