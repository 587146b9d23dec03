//! Millrace — pooled event-loop executors with coroutine-style file I/O
//!
//! A millrace is the channel that feeds water to a mill wheel. Here, each
//! event loop is a channel feeding file I/O jobs to one dedicated thread:
//! - **Executors**: single-threaded event loops, driven standalone or by a
//!   fixed pool with round-robin handout (`EventLoop`, `ExecutorPool`)
//! - **Files**: sequential async read/write bound to one executor for the
//!   handle's whole life (`AsyncFile`)
//! - **Driving**: a minimal `block_on` so synchronous code can await the
//!   operation futures without an external runtime
//!
//! # Example
//!
//! ```ignore
//! use millrace::{block_on, AsyncFile, ExecutorPool, OpenMode};
//!
//! let pool = ExecutorPool::new(4)?;
//! pool.start();
//!
//! let mut file = AsyncFile::open("data.bin", pool.get_executor(), OpenMode::Read)?;
//! let mut buf = vec![0u8; 4096];
//! while !file.eof() {
//!     let n = block_on(file.read(&mut buf))?;
//!     // use &buf[..n]
//! }
//! file.close()?;
//!
//! pool.stop();
//! pool.join();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Modules
// ============================================================================

/// Minimal synchronous driver for this crate's futures
mod block_on;

/// Crate-wide error and result types
mod error;

/// Single-threaded event loop and its cloneable handle
mod executor;

/// Asynchronous sequential file handle
mod file;

/// One-shot completion cell between loop threads and operation futures
mod op;

/// Fixed pool of event loops with round-robin handout
mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use block_on::block_on;
pub use error::{Error, Result};
pub use executor::{EventLoop, Executor};
pub use file::{AsyncFile, OpenMode};
pub use pool::ExecutorPool;
