//! Concurrency tests for the readers-writer store gate.
//!
//! Parallel readers and writers over a shared key universe must settle to
//! a state some serial interleaving could have produced, and readers must
//! only ever observe values that were written.

use std::sync::Arc;

use keywire_proto::Value;
use keywire_store::Store;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disjoint_writers_all_land() {
    let store = Arc::new(Store::new(2, 5).expect("valid parameters"));

    let mut tasks = Vec::new();
    for writer in 0..8 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                store.add(format!("w{writer}-{i:02}"), Value::Int(writer * 100 + i)).await;
            }
        }));
    }
    for task in tasks {
        task.await.expect("writer task completes");
    }

    assert_eq!(store.len().await, 8 * 50);
    for writer in 0..8 {
        for i in 0..50 {
            let found = store.find(&format!("w{writer}-{i:02}")).await;
            assert_eq!(found, Some(Value::Int(writer * 100 + i)));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_only_observe_written_values() {
    let store = Arc::new(Store::new(2, 3).expect("valid parameters"));
    let key = "contested";

    let mut writers = Vec::new();
    for value in 0..4 {
        let store = Arc::clone(&store);
        writers.push(tokio::spawn(async move {
            for _ in 0..100 {
                store.add(key.into(), Value::Int(value)).await;
            }
        }));
    }

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        readers.push(tokio::spawn(async move {
            for _ in 0..100 {
                if let Some(value) = store.find(key).await {
                    // Any observed value must be one some writer produced.
                    assert!(matches!(value, Value::Int(0..=3)));
                }
            }
        }));
    }

    for task in writers.into_iter().chain(readers) {
        task.await.expect("task completes");
    }

    // Writers are serialised, so the final value is whichever write
    // acquired the gate last, still one of the written values.
    assert!(matches!(store.find(key).await, Some(Value::Int(0..=3))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_adds_and_removes_converge() {
    let store = Arc::new(Store::new(2, 3).expect("valid parameters"));

    // Phase 1: every key is present.
    for i in 0..40 {
        store.add(format!("k{i:02}"), Value::Bool(true)).await;
    }

    // Phase 2: removers take the even keys while writers refresh the odd
    // ones, racing against readers.
    let mut tasks = Vec::new();
    for i in (0..40).step_by(2) {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.remove(&format!("k{i:02}")).await;
        }));
    }
    for i in (1..40).step_by(2) {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.add(format!("k{i:02}"), Value::Bool(false)).await;
        }));
    }
    for _ in 0..8 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            for i in 0..40 {
                let _ = store.find(&format!("k{i:02}")).await;
            }
        }));
    }
    for task in tasks {
        task.await.expect("task completes");
    }

    // Serial-equivalent outcome: evens gone, odds refreshed.
    assert_eq!(store.len().await, 20);
    for i in 0..40 {
        let found = store.find(&format!("k{i:02}")).await;
        if i % 2 == 0 {
            assert_eq!(found, None);
        } else {
            assert_eq!(found, Some(Value::Bool(false)));
        }
    }
}
