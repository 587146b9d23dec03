//! Executor pool lifecycle and handle handout behavior.

use crossbeam::channel;
use millrace::{Error, ExecutorPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_round_robin_handout_is_fair() {
    let pool = ExecutorPool::new(4).unwrap();

    // 10 handouts over 4 loops: the first two loops get one extra.
    let mut counts = [0usize; 4];
    for _ in 0..10 {
        counts[pool.get_executor().id()] += 1;
    }
    assert_eq!(counts, [3, 3, 2, 2]);

    // Over any M, every loop lands on floor(M/N) or ceil(M/N).
    let mut counts = [0usize; 4];
    for _ in 0..25 {
        counts[pool.get_executor().id()] += 1;
    }
    for &count in &counts {
        assert!(count == 6 || count == 7, "unfair handout: {:?}", counts);
    }
}

#[test]
fn test_handles_usable_before_start() {
    let pool = ExecutorPool::new(2).unwrap();
    let executor = pool.get_executor();

    let ran = Arc::new(AtomicBool::new(false));
    {
        let ran = ran.clone();
        executor
            .post(move || ran.store(true, Ordering::Release))
            .unwrap();
    }

    // No worker threads exist yet, so the job just sits in the queue.
    thread::sleep(Duration::from_millis(50));
    assert!(!ran.load(Ordering::Acquire));

    pool.start();
    thread::sleep(Duration::from_millis(100));
    assert!(ran.load(Ordering::Acquire));

    pool.stop();
    pool.join();
}

#[test]
fn test_handles_usable_after_stop() {
    let pool = ExecutorPool::new(2).unwrap();
    pool.start();
    pool.stop();
    pool.join();

    let executor = pool.get_executor();
    assert!(!executor.is_running());
    assert!(matches!(executor.post(|| {}), Err(Error::Shutdown)));
}

#[test]
fn test_jobs_queued_before_stop_still_run() {
    let pool = ExecutorPool::new(1).unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    {
        let ran = ran.clone();
        pool.get_executor()
            .post(move || ran.store(true, Ordering::Release))
            .unwrap();
    }

    // The shutdown message queues behind the job, so starting afterwards
    // still executes it.
    pool.stop();
    pool.start();
    pool.join();
    assert!(ran.load(Ordering::Acquire));
}

#[test]
fn test_start_is_idempotent() {
    let pool = ExecutorPool::new(2).unwrap();
    pool.start();
    pool.start();
    assert!(pool.is_started());

    let (tx, rx) = channel::unbounded();
    pool.get_executor().post(move || tx.send(()).unwrap()).unwrap();
    rx.recv_timeout(Duration::from_secs(2)).unwrap();

    pool.stop();
    pool.stop();
    pool.join();
    pool.join();
}

#[test]
fn test_run_blocks_until_stopped() {
    let pool = Arc::new(ExecutorPool::new(2).unwrap());
    let runner = {
        let pool = pool.clone();
        thread::spawn(move || pool.run())
    };

    thread::sleep(Duration::from_millis(50));
    assert!(pool.is_started());
    assert!(!runner.is_finished());
    assert!(pool.executor_at(0).unwrap().is_running());

    pool.stop();
    runner.join().unwrap();
    assert!(!pool.executor_at(0).unwrap().is_running());
}

#[test]
fn test_jobs_run_on_named_loop_threads() {
    let pool = ExecutorPool::new(1).unwrap();
    pool.start();

    let (tx, rx) = channel::unbounded();
    pool.get_executor()
        .post(move || {
            let name = thread::current().name().unwrap_or("").to_string();
            tx.send(name).unwrap();
        })
        .unwrap();

    let name = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(name, "millrace-loop-0");

    pool.stop();
    pool.join();
}

#[test]
fn test_loops_run_in_parallel() {
    let pool = ExecutorPool::new(4).unwrap();
    pool.start();

    // Four sleeping jobs, one per loop: parallel execution finishes in
    // roughly one sleep, not four.
    let (tx, rx) = channel::unbounded();
    for index in 0..4 {
        let tx = tx.clone();
        pool.executor_at(index)
            .unwrap()
            .post(move || {
                thread::sleep(Duration::from_millis(100));
                tx.send(index).unwrap();
            })
            .unwrap();
    }
    drop(tx);

    let start = std::time::Instant::now();
    let mut done: Vec<usize> = rx.iter().take(4).collect();
    done.sort_unstable();
    assert_eq!(done, vec![0, 1, 2, 3]);
    assert!(start.elapsed() < Duration::from_millis(350));

    pool.stop();
    pool.join();
}

#[test]
fn test_drop_stops_and_joins() {
    let pool = ExecutorPool::new(2).unwrap();
    pool.start();

    let executor = pool.get_executor();
    drop(pool);

    // The loops are gone; the surviving handle reports the shutdown.
    assert!(!executor.is_running());
    assert!(matches!(executor.post(|| {}), Err(Error::Shutdown)));
}
