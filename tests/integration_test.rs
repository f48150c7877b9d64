#![cfg(not(loom))]

use pilfer::{Config, Pool};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn basic_execution() {
    let pool = Pool::with_threads(4).unwrap();

    let h1 = pool.submit(|| 42);
    let h2 = pool.submit(|| -> i32 { panic!("x") });
    let h3 = pool.submit(|| {});

    assert_eq!(h1.join().unwrap(), 42);

    let err = h2.join().unwrap_err();
    assert!(err.is_panic());
    let payload = err.try_into_panic().unwrap();
    assert_eq!(*payload.downcast_ref::<&str>().unwrap(), "x");

    assert!(h3.join().is_ok());
}

#[test]
fn multiple_tasks_return_their_own_results() {
    let pool = Pool::with_threads(4).unwrap();
    let executed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..1000_usize)
        .map(|i| {
            let executed = executed.clone();
            pool.submit(move || {
                executed.fetch_add(1, Ordering::Relaxed);
                i
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), i);
    }
    assert_eq!(executed.load(Ordering::Relaxed), 1000);
}

#[test]
fn mixed_result_types() {
    let pool = Pool::with_threads(4).unwrap();

    let int_handle = pool.submit(|| 42);
    let string_handle = pool.submit(|| String::from("hello"));
    let unit_handle = pool.submit(|| {});
    let float_handle = pool.submit(|| 3.14_f64);

    assert_eq!(int_handle.join().unwrap(), 42);
    assert_eq!(string_handle.join().unwrap(), "hello");
    unit_handle.join().unwrap();
    assert!((float_handle.join().unwrap() - 3.14).abs() < f64::EPSILON);
}

#[test]
fn panic_does_not_poison_the_pool() {
    let pool = Pool::with_threads(2).unwrap();

    let failing = pool.submit(|| -> i32 { panic!("test panic") });
    let healthy = pool.submit(|| 84);

    assert!(failing.join().is_err());
    assert_eq!(healthy.join().unwrap(), 84);

    // Workers survived; the pool keeps scheduling.
    assert_eq!(pool.submit(|| 1).join().unwrap(), 1);
}

#[test]
fn wait_observes_all_increments() {
    let pool = Pool::with_threads(8).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..16_000 {
        let counter = counter.clone();
        pool.execute(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    pool.wait();

    assert_eq!(counter.load(Ordering::Relaxed), 16_000);
    assert_eq!(pool.pending_tasks(), 0);
}

fn spawn_tree(pool: &Arc<Pool>, depth: u32, invocations: &Arc<AtomicUsize>) {
    if depth == 0 {
        return;
    }
    invocations.fetch_add(1, Ordering::Relaxed);

    for _ in 0..2 {
        let pool_clone = Arc::clone(pool);
        let invocations = Arc::clone(invocations);
        pool.execute(move || spawn_tree(&pool_clone, depth - 1, &invocations));
    }
}

#[test]
fn recursive_submission_completes() {
    let pool = Arc::new(Pool::with_threads(4).unwrap());
    let invocations = Arc::new(AtomicUsize::new(0));

    {
        let pool_clone = Arc::clone(&pool);
        let invocations = Arc::clone(&invocations);
        pool.execute(move || spawn_tree(&pool_clone, 5, &invocations));
    }
    pool.wait();

    // Depths 5..=1 run: 1 + 2 + 4 + 8 + 16.
    assert_eq!(invocations.load(Ordering::Relaxed), 31);
    assert_eq!(pool.pending_tasks(), 0);
}

#[test]
fn concurrent_external_producers() {
    let pool = Arc::new(Pool::new().unwrap());
    let executed = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..16)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let executed = Arc::clone(&executed);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let executed = executed.clone();
                    pool.execute(move || {
                        executed.fetch_add(1, Ordering::Relaxed);
                    });
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    pool.wait();

    assert_eq!(executed.load(Ordering::Relaxed), 16_000);
    assert_eq!(pool.pending_tasks(), 0);
}

#[test]
fn handles_cross_threads() {
    let pool = Arc::new(Pool::with_threads(4).unwrap());
    let (tx, rx) = crossbeam_channel::unbounded();

    let producers: Vec<_> = (0..4_u64)
        .map(|producer| {
            let pool = Arc::clone(&pool);
            let tx = tx.clone();
            thread::spawn(move || {
                for i in 0..500_u64 {
                    let handle = pool.submit(move || producer * 500 + i);
                    tx.send(handle).unwrap();
                }
            })
        })
        .collect();
    drop(tx);

    let mut sum = 0;
    for handle in rx {
        sum += handle.join().unwrap();
    }
    for producer in producers {
        producer.join().unwrap();
    }

    // 0 + 1 + ... + 1999
    assert_eq!(sum, 1999 * 2000 / 2);
}

#[test]
fn destructor_waits_for_tasks() {
    let completed = Arc::new(AtomicBool::new(false));

    {
        let pool = Pool::with_threads(2).unwrap();
        let completed = completed.clone();
        pool.execute(move || {
            thread::sleep(Duration::from_millis(100));
            completed.store(true, Ordering::Release);
        });
    }

    assert!(completed.load(Ordering::Acquire));
}

#[test]
fn memory_ordering_pairs() {
    let pool = Pool::with_threads(8).unwrap();
    let x = Arc::new(AtomicI32::new(0));
    let y = Arc::new(AtomicI32::new(0));
    let mut violations = 0;

    for _ in 0..10_000 {
        x.store(0, Ordering::SeqCst);
        y.store(0, Ordering::SeqCst);

        let (x1, y1) = (x.clone(), y.clone());
        let r1 = pool
            .submit(move || {
                x1.store(1, Ordering::Release);
                y1.load(Ordering::Acquire)
            })
            .join()
            .unwrap();

        // The join above happens-before this submission, so the
        // second task must observe the first one's store if every
        // hand-off in the dispatch path keeps its release/acquire
        // pairing.
        let (x2, y2) = (x.clone(), y.clone());
        let r2 = pool
            .submit(move || {
                y2.store(1, Ordering::Release);
                x2.load(Ordering::Acquire)
            })
            .join()
            .unwrap();

        if r1 == 0 && r2 == 0 {
            violations += 1;
        }
    }

    assert_eq!(violations, 0);
}

#[test]
fn work_stealing_balance() {
    let pool = Pool::with_threads(4).unwrap();

    for _ in 0..10_000 {
        pool.execute(|| {
            thread::sleep(Duration::from_micros(100));
        });
    }
    pool.wait();

    let metrics = pool.worker_metrics();
    let executed: Vec<u64> = metrics
        .iter()
        .map(|m| m.tasks_executed)
        .filter(|&n| n > 0)
        .collect();

    let total: u64 = executed.iter().sum();
    assert_eq!(total, 10_000);

    let max = *executed.iter().max().unwrap();
    let min = *executed.iter().min().unwrap();
    let ratio = max as f64 / min as f64;
    assert!(ratio < 3.0, "balance ratio {} (min {}, max {})", ratio, min, max);
}

#[test]
fn full_ring_spills_to_the_injector() {
    let config = Config::builder()
        .num_threads(2)
        .queue_capacity(16)
        .build()
        .unwrap();
    let pool = Arc::new(Pool::with_config(config).unwrap());
    let counter = Arc::new(AtomicUsize::new(0));

    // A worker fanning out far beyond its ring capacity must spill
    // the excess without blocking or dropping anything.
    {
        let pool_clone = Arc::clone(&pool);
        let counter = Arc::clone(&counter);
        pool.execute(move || {
            for _ in 0..1000 {
                let counter = counter.clone();
                pool_clone.execute(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        });
    }
    pool.wait();

    assert_eq!(counter.load(Ordering::Relaxed), 1000);
}

#[test]
fn thread_count_verification() {
    for count in [1_usize, 2, 4, 8] {
        let pool = Pool::with_threads(count).unwrap();
        assert_eq!(pool.thread_count(), count);
    }
}

#[test]
fn pool_is_reusable_after_wait() {
    let pool = Pool::with_threads(2).unwrap();

    assert_eq!(pool.submit(|| 1).join().unwrap(), 1);
    pool.wait();

    assert_eq!(pool.submit(|| 2).join().unwrap(), 2);
    pool.wait();
    assert_eq!(pool.pending_tasks(), 0);
}

#[test]
fn wait_from_inside_a_task_returns() {
    let pool = Arc::new(Pool::with_threads(4).unwrap());
    let children = Arc::new(AtomicUsize::new(0));

    let pool_clone = Arc::clone(&pool);
    let children_clone = Arc::clone(&children);
    let observed = pool
        .submit(move || {
            for _ in 0..64 {
                let children = children_clone.clone();
                pool_clone.execute(move || {
                    children.fetch_add(1, Ordering::Relaxed);
                });
            }
            // Quiescence from inside a task: every child must have
            // run by the time this returns.
            pool_clone.wait();
            children_clone.load(Ordering::Relaxed)
        })
        .join()
        .unwrap();

    assert_eq!(observed, 64);
}

#[test]
fn rejects_invalid_configuration() {
    assert!(Pool::with_threads(0).is_err());
    assert!(Config::builder().queue_capacity(100).build().is_err());
}
