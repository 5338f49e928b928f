//! A small leaderboard: players, a score index maintained transactionally,
//! and a subscription that reports score changes as they commit.
//!
//! Run with `cargo run --example leaderboard`.

use tupledb::{transactionally, tuple, MemoryStorage, ScanArgs, TupleClient, TupleDatabase};

fn main() -> tupledb::Result<()> {
    let client = TupleClient::new(TupleDatabase::new(MemoryStorage::<f64>::new()));
    let game = client.subspace(&tuple!["game", "demo"]);

    // Watch the score range of this game.
    let subscription = game.subscribe(&ScanArgs::new().prefix(tuple!["score"]), |writes| {
        for pair in writes.sets() {
            println!("score changed: {} -> {}", pair.key, pair.value);
        }
        for key in writes.removes() {
            println!("score cleared: {key}");
        }
    })?;

    for (player, points) in [("chet", 2.0), ("zoe", 5.0), ("joe", 3.0)] {
        add_points(&game, player, points)?;
    }

    // Top scores, straight off the index: highest first.
    let top = game.scan(
        &ScanArgs::new()
            .prefix(tuple!["score-index"])
            .reverse(true)
            .limit(2),
    )?;
    println!("top 2:");
    for pair in top {
        println!("  {}", pair.key);
    }

    subscription.unsubscribe();
    client.close()
}

/// Add points to a player, keeping the score index in step. Retries
/// automatically if a concurrent writer invalidates the read.
fn add_points(
    game: &TupleClient<MemoryStorage<f64>>,
    player: &str,
    points: f64,
) -> tupledb::Result<f64> {
    transactionally(game, |tx| {
        let old = tx.get(&tuple!["score", player])?.unwrap_or(0.0);
        let new = old + points;
        tx.set(&tuple!["score", player], new)?;
        if old != 0.0 {
            tx.remove(&tuple!["score-index", old, player])?;
        }
        tx.set(&tuple!["score-index", new, player], new)?;
        Ok(new)
    })
}
