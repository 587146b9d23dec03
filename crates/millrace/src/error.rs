//! Error types for pool construction and file operations.

use std::io;
use std::path::PathBuf;

/// Errors reported by executor pools, event loops, and async files.
///
/// End-of-file is not represented here: a read that lands at or past the end
/// of the file succeeds with a short (possibly zero) count and raises the
/// file's EOF flag instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pool configured with zero event loops
    #[error("executor pool requires at least one event loop")]
    EmptyPool,

    /// Opening a file failed
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        /// Path passed to open
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Operation on a file that has already been closed
    #[error("file is closed")]
    Closed,

    /// Operation while a previous one is still in flight on the same file
    #[error("a previous operation is still pending on this file")]
    Busy,

    /// The bound event loop has stopped and cannot run posted work
    #[error("event loop has shut down")]
    Shutdown,

    /// OS-level read or write failure
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
