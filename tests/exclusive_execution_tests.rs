//! Concurrency behaviour of named exclusive execution

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use module_reconfig::classloading::{ExclusiveError, NamedExclusiveSingleOperations};

type Operations = NamedExclusiveSingleOperations<Arc<String>, String>;

#[test]
fn test_concurrent_callers_share_one_production() {
    const CALLERS: usize = 16;
    let operations = Arc::new(Operations::new());
    let store: Arc<DashMap<String, Arc<String>>> = Arc::new(DashMap::new());
    let produced = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let operations = Arc::clone(&operations);
            let store = Arc::clone(&store);
            let produced = Arc::clone(&produced);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                operations.exclusive_execution(
                    "com.example.Widget",
                    |name| store.get(name).map(|entry| Arc::clone(entry.value())),
                    |name, bytes: Vec<u8>| {
                        produced.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        let value = Arc::new(format!("{}:{}", name, bytes.len()));
                        store.insert(name.to_string(), Arc::clone(&value));
                        Ok(value)
                    },
                    vec![0u8; 42],
                )
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();

    assert_eq!(produced.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|value| Arc::ptr_eq(value, &results[0])));
    assert_eq!(results[0].as_str(), "com.example.Widget:42");
    assert_eq!(operations.pending_operations(), 0);
}

#[test]
fn test_failure_reaches_every_caller() {
    const CALLERS: usize = 8;
    let operations = Arc::new(Operations::new());
    let attempts = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let operations = Arc::clone(&operations);
            let attempts = Arc::clone(&attempts);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                operations.exclusive_execution(
                    "broken",
                    |_| None,
                    |name, ()| {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        // Outlasts the barrier release so every other caller is waiting
                        thread::sleep(Duration::from_millis(300));
                        Err(format!("cannot define {}", name))
                    },
                    (),
                )
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            Err(ExclusiveError::Failed("cannot define broken".to_string()))
        );
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(!operations.is_pending("broken"));
}

#[test]
fn test_waiter_times_out_while_producer_finishes() {
    let operations = Arc::new(Operations::with_wait_timeout(Duration::from_millis(50)));
    let (started_tx, started_rx) = mpsc::channel();

    let producer = {
        let operations = Arc::clone(&operations);
        thread::spawn(move || {
            operations.exclusive_execution(
                "slow",
                |_| None,
                |name, ()| {
                    started_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(300));
                    Ok(Arc::new(name.to_string()))
                },
                (),
            )
        })
    };

    started_rx.recv().unwrap();
    assert!(operations.is_pending("slow"));
    let waiter = operations.exclusive_execution("slow", |_| None, |_, ()| unreachable!(), ());
    assert!(matches!(
        waiter,
        Err(ExclusiveError::Timeout { ref name, waited })
            if name == "slow" && waited == Duration::from_millis(50)
    ));

    assert_eq!(producer.join().unwrap().unwrap().as_str(), "slow");
    assert_eq!(operations.pending_operations(), 0);
}

#[test]
fn test_distinct_names_do_not_block_each_other() {
    let operations = Arc::new(Operations::new());
    let (b_done_tx, b_done_rx) = mpsc::channel::<()>();
    let (a_started_tx, a_started_rx) = mpsc::channel::<()>();

    let first = {
        let operations = Arc::clone(&operations);
        thread::spawn(move || {
            operations.exclusive_execution(
                "a",
                |_| None,
                |name, ()| {
                    a_started_tx.send(()).unwrap();
                    // Only completes if "b" can run while "a" is still producing
                    b_done_rx
                        .recv_timeout(Duration::from_secs(5))
                        .map_err(|e| e.to_string())?;
                    Ok(Arc::new(name.to_string()))
                },
                (),
            )
        })
    };

    a_started_rx.recv().unwrap();
    let second = operations.exclusive_execution(
        "b",
        |_| None,
        |name, ()| Ok(Arc::new(name.to_string())),
        (),
    );
    assert_eq!(second.unwrap().as_str(), "b");
    b_done_tx.send(()).unwrap();

    assert_eq!(first.join().unwrap().unwrap().as_str(), "a");
    assert_eq!(operations.pending_operations(), 0);
}

#[test]
fn test_precheck_hit_skips_registration() {
    let operations = Operations::new();
    let value = operations
        .exclusive_execution(
            "cached",
            |name| Some(Arc::new(format!("{} from cache", name))),
            |_, ()| Err("should not run".to_string()),
            (),
        )
        .unwrap();
    assert_eq!(value.as_str(), "cached from cache");
    assert_eq!(operations.pending_operations(), 0);
}
