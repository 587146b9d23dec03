//! Single-threaded event loop and its cloneable posting handle.
//!
//! An `EventLoop` drains a FIFO queue of posted jobs on one thread until it
//! is told to stop. The `Executor` handle is what files bind to: it carries
//! the loop's id, running state, and the `post` primitive. Loops are either
//! driven standalone (`EventLoop::run` on a thread of the caller's choosing)
//! or owned by an `ExecutorPool` that dedicates one thread per loop.

use crate::error::{Error, Result};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Job posted to an event loop.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Message drained by the loop thread.
enum Message {
    /// Run a job
    Job(Job),
    /// Finish jobs queued ahead of this message, then exit
    Shutdown,
}

/// State shared between a loop and all of its handles.
struct Shared {
    /// Loop index (position in the pool; 0 for standalone loops)
    id: usize,

    /// Job queue sender
    tx: Sender<Message>,

    /// True while the drive loop is executing
    running: AtomicBool,

    /// Set once stop has been requested; posts fail fast afterwards
    stopped: AtomicBool,
}

/// Cloneable handle to one event loop.
///
/// Handles stay valid for the life of the loop: posting before the loop runs
/// queues the job until it starts, and posting after it stops reports
/// [`Error::Shutdown`] instead of hanging.
#[derive(Clone)]
pub struct Executor {
    shared: Arc<Shared>,
}

impl Executor {
    /// Index of the loop this handle belongs to.
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// Whether the drive loop is currently executing.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Queue a job for execution on the loop thread.
    ///
    /// Jobs run strictly in posting order. Fails with [`Error::Shutdown`]
    /// once the loop has been stopped.
    pub fn post<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        self.shared
            .tx
            .send(Message::Job(Box::new(job)))
            .map_err(|_| Error::Shutdown)
    }

    /// Ask the loop to exit after draining jobs queued ahead of the request.
    ///
    /// Idempotent. Jobs posted after the first stop fail with
    /// [`Error::Shutdown`].
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // The loop may already be gone; the flag above is what makes
        // later posts fail.
        let _ = self.shared.tx.send(Message::Shutdown);
    }
}

/// A single-threaded event loop.
///
/// Holds its own sender, so an idle loop waits for more jobs instead of
/// returning; `run` exits only after a stop request.
pub struct EventLoop {
    shared: Arc<Shared>,
    rx: Receiver<Message>,
}

impl EventLoop {
    /// Create a standalone loop.
    pub fn new() -> Self {
        Self::with_id(0)
    }

    /// Create a loop with an explicit pool index.
    pub(crate) fn with_id(id: usize) -> Self {
        let (tx, rx) = channel::unbounded::<Message>();
        let shared = Arc::new(Shared {
            id,
            tx,
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });
        Self { shared, rx }
    }

    /// Index of this loop.
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// Handle for posting jobs and requesting shutdown.
    pub fn handle(&self) -> Executor {
        Executor {
            shared: self.shared.clone(),
        }
    }

    /// Drive the loop on the calling thread until it is stopped.
    ///
    /// Jobs posted before `run` execute once the loop starts, in posting
    /// order. A panicking job unwinds out of `run`; the lifecycle flags
    /// are still cleared on the way out.
    pub fn run(self) {
        self.shared.running.store(true, Ordering::Release);
        let _guard = RunGuard {
            shared: self.shared.clone(),
        };

        loop {
            match self.rx.recv() {
                Ok(Message::Job(job)) => job(),
                Ok(Message::Shutdown) | Err(_) => break,
            }
        }
    }
}

/// Clears the lifecycle flags when the drive loop exits, including by a
/// panic unwinding out of a job.
struct RunGuard {
    shared: Arc<Shared>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.stopped.store(true, Ordering::Release);

        #[cfg(debug_assertions)]
        eprintln!("EventLoop {} shutting down", self.shared.id);
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_posting_order() {
        let event_loop = EventLoop::new();
        let executor = event_loop.handle();

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..8 {
            let order = order.clone();
            executor.post(move || order.lock().push(i)).unwrap();
        }

        // Jobs were queued before the loop started.
        let driver = thread::spawn(move || event_loop.run());
        thread::sleep(Duration::from_millis(50));

        executor.stop();
        driver.join().unwrap();

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_running_flag_tracks_lifecycle() {
        let event_loop = EventLoop::new();
        let executor = event_loop.handle();
        assert!(!executor.is_running());

        let driver = thread::spawn(move || event_loop.run());
        thread::sleep(Duration::from_millis(20));
        assert!(executor.is_running());

        executor.stop();
        driver.join().unwrap();
        assert!(!executor.is_running());
    }

    #[test]
    fn test_post_after_stop_fails() {
        let event_loop = EventLoop::new();
        let executor = event_loop.handle();

        executor.stop();
        assert!(matches!(executor.post(|| {}), Err(Error::Shutdown)));

        // The queued shutdown message makes run return immediately.
        event_loop.run();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let event_loop = EventLoop::new();
        let executor = event_loop.handle();

        let driver = thread::spawn(move || event_loop.run());
        executor.stop();
        executor.stop();
        driver.join().unwrap();
    }

    #[test]
    fn test_jobs_before_stop_still_run() {
        let event_loop = EventLoop::new();
        let executor = event_loop.handle();

        let ran = Arc::new(AtomicBool::new(false));
        {
            let ran = ran.clone();
            executor
                .post(move || ran.store(true, Ordering::Release))
                .unwrap();
        }
        executor.stop();

        // Shutdown sits behind the job, so the job still executes.
        event_loop.run();
        assert!(ran.load(Ordering::Acquire));
    }

    #[test]
    fn test_job_panic_marks_loop_stopped() {
        let event_loop = EventLoop::new();
        let executor = event_loop.handle();
        executor.post(|| panic!("job failure")).unwrap();

        // The panic unwinds out of `run` and kills the driver thread.
        let driver = thread::spawn(move || event_loop.run());
        assert!(driver.join().is_err());

        assert!(!executor.is_running());
        assert!(matches!(executor.post(|| {}), Err(Error::Shutdown)));
    }

    #[test]
    fn test_handle_reports_loop_id() {
        let event_loop = EventLoop::with_id(3);
        assert_eq!(event_loop.id(), 3);
        assert_eq!(event_loop.handle().id(), 3);
        assert_eq!(EventLoop::new().handle().id(), 0);
    }
}
