//! Fixed pool of event loops with round-robin handle handout.
//!
//! All loops are created at construction, so handles can be handed out
//! before the worker threads start and remain valid after they stop.
//! `run` blocks the calling thread (start + join), matching the usual
//! pattern of driving the pool from one dedicated thread.

use crate::error::{Error, Result};
use crate::executor::{EventLoop, Executor};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Fixed-size pool of event loops, one worker thread per loop.
pub struct ExecutorPool {
    /// Handles in loop order; fixed at construction
    executors: Vec<Executor>,

    /// Loops not yet running; consumed by `start`
    seeds: Mutex<Vec<EventLoop>>,

    /// Worker thread handles
    threads: Mutex<Vec<JoinHandle<()>>>,

    /// Round-robin cursor for `get_executor`
    cursor: AtomicUsize,

    /// Whether `start` has spawned the worker threads
    started: AtomicBool,
}

impl ExecutorPool {
    /// Create a pool of `size` event loops, not yet running.
    ///
    /// Fails with [`Error::EmptyPool`] when `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::EmptyPool);
        }

        let mut executors = Vec::with_capacity(size);
        let mut seeds = Vec::with_capacity(size);
        for id in 0..size {
            let event_loop = EventLoop::with_id(id);
            executors.push(event_loop.handle());
            seeds.push(event_loop);
        }

        Ok(Self {
            executors,
            seeds: Mutex::new(seeds),
            threads: Mutex::new(Vec::with_capacity(size)),
            cursor: AtomicUsize::new(0),
            started: AtomicBool::new(false),
        })
    }

    /// Number of event loops in the pool.
    pub fn size(&self) -> usize {
        self.executors.len()
    }

    /// Whether the worker threads have been spawned.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Next handle in round-robin order.
    ///
    /// Lock-free and fair: over M calls each of the N loops is selected
    /// ⌊M/N⌋ or ⌈M/N⌉ times. Valid in every lifecycle state — before
    /// `start`, posted jobs queue until the loops run; after `stop`, the
    /// handle still answers queries while posts report
    /// [`Error::Shutdown`].
    pub fn get_executor(&self) -> Executor {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.executors.len();
        self.executors[index].clone()
    }

    /// Handle for the loop at `index`, or `None` past the end.
    pub fn executor_at(&self, index: usize) -> Option<Executor> {
        self.executors.get(index).cloned()
    }

    /// Spawn one worker thread per loop. Idempotent and non-blocking.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut threads = self.threads.lock();
        for event_loop in self.seeds.lock().drain(..) {
            let handle = thread::Builder::new()
                .name(format!("millrace-loop-{}", event_loop.id()))
                .spawn(move || event_loop.run())
                .expect("Failed to spawn event loop thread");
            threads.push(handle);
        }
    }

    /// Drive the pool from the calling thread: `start` + `join`.
    ///
    /// Blocks until `stop` has been called and every loop has exited. Call
    /// it from a dedicated thread for background operation.
    pub fn run(&self) {
        self.start();
        self.join();
    }

    /// Ask every loop to exit after draining its already-queued jobs.
    ///
    /// Idempotent and non-blocking; pair with `join` to wait for the
    /// threads. An in-flight job is never interrupted.
    pub fn stop(&self) {
        for executor in &self.executors {
            executor.stop();
        }
    }

    /// Wait for all worker threads to exit.
    ///
    /// Safe to call from several threads; late callers block until the
    /// first caller has finished joining.
    pub fn join(&self) {
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Default for ExecutorPool {
    /// Pool sized to the machine's logical CPU count.
    fn default() -> Self {
        Self::new(num_cpus::get()).expect("hardware concurrency is at least one")
    }
}

impl Drop for ExecutorPool {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
