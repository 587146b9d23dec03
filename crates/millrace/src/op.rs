//! One-shot completion cell between an event-loop thread and an awaiting future.
//!
//! Every file operation posts one job to its bound loop and awaits the cell
//! that job completes. Dropping the completer without completing closes the
//! cell, so a job discarded by a stopping loop can never strand the future
//! waiting on it.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// State shared between the completer and the waiting future.
struct CellState<T> {
    /// Completed value, present once the job has run
    value: Option<T>,
    /// Set when the completer was dropped without completing
    closed: bool,
    /// Waker of the future currently awaiting the cell
    waker: Option<Waker>,
}

/// Consumer half: awaited by the operation future, probed during
/// reconciliation of an abandoned operation.
pub(crate) struct OpCell<T> {
    state: Arc<Mutex<CellState<T>>>,
}

impl<T> Clone for OpCell<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

/// Outcome of a non-blocking probe of the cell.
pub(crate) enum Probe<T> {
    /// The job has not finished yet
    Pending,
    /// The job finished with this value
    Done(T),
    /// The completer was dropped without completing
    Closed,
}

impl<T> OpCell<T> {
    /// Create an empty cell and its completer.
    pub(crate) fn new() -> (Self, OpCompleter<T>) {
        let state = Arc::new(Mutex::new(CellState {
            value: None,
            closed: false,
            waker: None,
        }));
        (
            Self {
                state: state.clone(),
            },
            OpCompleter {
                state,
                completed: false,
            },
        )
    }

    /// Non-blocking probe; takes the value if the job has finished.
    pub(crate) fn probe(&self) -> Probe<T> {
        let mut state = self.state.lock();
        if let Some(value) = state.value.take() {
            Probe::Done(value)
        } else if state.closed {
            Probe::Closed
        } else {
            Probe::Pending
        }
    }

    /// Await the completed value.
    ///
    /// Resolves with `Error::Shutdown` if the completer is dropped before
    /// completing, which happens when the loop discards the job.
    pub(crate) fn wait(&self) -> Wait<'_, T> {
        Wait { cell: self }
    }
}

/// Future returned by [`OpCell::wait`].
pub(crate) struct Wait<'a, T> {
    cell: &'a OpCell<T>,
}

impl<T> Future for Wait<'_, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.cell.state.lock();
        if let Some(value) = state.value.take() {
            return Poll::Ready(Ok(value));
        }
        if state.closed {
            return Poll::Ready(Err(Error::Shutdown));
        }
        // Last registered waker wins; a re-poll must replace the stale one.
        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Producer half, moved into the posted job. Completing consumes it.
pub(crate) struct OpCompleter<T> {
    state: Arc<Mutex<CellState<T>>>,
    completed: bool,
}

impl<T> OpCompleter<T> {
    /// Store the value and wake the waiting future.
    pub(crate) fn complete(mut self, value: T) {
        let waker = {
            let mut state = self.state.lock();
            state.value = Some(value);
            state.waker.take()
        };
        self.completed = true;
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for OpCompleter<T> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let waker = {
            let mut state = self.state.lock();
            state.closed = true;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}
