//! Asynchronous sequential file handle bound to one event loop.
//!
//! An `AsyncFile` issues chunked reads and writes without blocking the
//! caller's thread: each operation posts exactly one job to the file's
//! bound executor, which performs one positioned OS access and completes
//! the cell the operation future is awaiting. Read and write offsets are
//! tracked independently, so one handle can consume a file while extending
//! it. At most one operation is in flight per file at any time; the `&mut`
//! receivers enforce this statically, and a pending cell catches the case
//! of a future dropped mid-flight.

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::op::{OpCell, Probe};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How to open a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only; the file must already exist
    Read,
    /// Write-only; created if missing, writes extend the existing content
    Append,
    /// Read and write on one handle; created if missing
    ReadWrite,
}

/// Bytes a read job pulled out of the file at the requested offset.
type ReadOutcome = io::Result<Vec<u8>>;

/// What a write job accomplished before succeeding or failing.
struct WriteOutcome {
    /// Bytes on disk, also when `result` is an error
    written: usize,
    result: io::Result<()>,
}

/// Cell of an operation whose future was dropped before completion.
enum PendingOp {
    Read(OpCell<ReadOutcome>),
    Write(OpCell<WriteOutcome>),
}

/// Sequential async file bound to one executor for its whole life.
///
/// Obtain the executor from an [`ExecutorPool`](crate::ExecutorPool) or a
/// standalone [`EventLoop`](crate::EventLoop). The loop does not have to be
/// running yet when the file is opened; operations queue until it is.
pub struct AsyncFile {
    /// Path the file was opened with
    path: PathBuf,

    /// Bound executor; every job for this file runs on its loop thread
    executor: Executor,

    /// Open descriptor, shared with in-flight jobs; `None` once closed
    file: Option<Arc<File>>,

    /// Mode the file was opened with
    mode: OpenMode,

    /// Offset of the next read
    read_pos: u64,

    /// Offset of the next write; starts at the file's length
    write_pos: u64,

    /// Set when a read returned fewer bytes than requested
    eof: bool,

    /// Operation whose future was dropped mid-flight, if any
    pending: Option<PendingOp>,
}

impl AsyncFile {
    /// Open `path` for sequential I/O on `executor`.
    ///
    /// The open itself is synchronous. On success the read offset is zero
    /// and the write offset is the file's current length, so writes always
    /// extend the file.
    pub fn open<P: AsRef<Path>>(path: P, executor: Executor, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => {
                options.read(true);
            }
            // Plain write, no O_APPEND: writes are positioned at the
            // tracked offset, which O_APPEND would override.
            OpenMode::Append => {
                options.write(true).create(true);
            }
            OpenMode::ReadWrite => {
                options.read(true).write(true).create(true);
            }
        }

        let file = options.open(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;

        let len = file
            .metadata()
            .map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?
            .len();

        Ok(Self {
            path,
            executor,
            file: Some(Arc::new(file)),
            mode,
            read_pos: 0,
            write_pos: len,
            eof: false,
            pending: None,
        })
    }

    /// Whether the file is open.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Whether a read has hit the end of the file.
    ///
    /// Raised by any read that returns fewer bytes than requested,
    /// including a zero-byte read at the end. Appending past the old end
    /// does not lower it; reads simply resume returning data.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Path the file was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the file was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Executor this file is bound to.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Offset of the next read.
    pub fn read_position(&self) -> u64 {
        self.read_pos
    }

    /// Offset of the next write.
    pub fn write_position(&self) -> u64 {
        self.write_pos
    }

    /// Read up to `buf.len()` bytes at the current read offset.
    ///
    /// Posts one job to the bound loop, which issues a single positioned
    /// OS read; the future copies the bytes into `buf` on completion. The
    /// read offset advances by the returned count, and the EOF flag rises
    /// when the count falls short of `buf.len()` — a read at end-of-file
    /// returns `Ok(0)`, not an error. An empty `buf` succeeds immediately
    /// without touching the file.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.require_open()?;
        self.reconcile_pending()?;

        if buf.is_empty() {
            return Ok(0);
        }

        let wanted = buf.len();
        let offset = self.read_pos;
        let (cell, completer) = OpCell::new();

        self.executor.post(move || {
            completer.complete(read_chunk_at(&file, offset, wanted));
        })?;
        self.pending = Some(PendingOp::Read(cell.clone()));

        let outcome = cell.wait().await;
        self.pending = None;
        let data = outcome??;

        let n = data.len();
        buf[..n].copy_from_slice(&data);
        self.read_pos += n as u64;
        if n < wanted {
            self.eof = true;
        }
        Ok(n)
    }

    /// Write all of `data` at the current write offset.
    ///
    /// Posts one job to the bound loop, which writes at the tracked offset
    /// and retries until every byte is down or an error occurs; a write
    /// that cannot make progress fails with `WriteZero`. The write offset
    /// advances by the bytes actually written, also on a partial failure.
    /// Empty `data` succeeds immediately without touching the file.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let file = self.require_open()?;
        self.reconcile_pending()?;

        if data.is_empty() {
            return Ok(());
        }

        let bytes = data.to_vec();
        let offset = self.write_pos;
        let (cell, completer) = OpCell::new();

        self.executor.post(move || {
            completer.complete(write_all_at(&file, offset, &bytes));
        })?;
        self.pending = Some(PendingOp::Write(cell.clone()));

        let outcome = cell.wait().await;
        self.pending = None;
        let WriteOutcome { written, result } = outcome?;

        self.write_pos += written as u64;
        result?;
        Ok(())
    }

    /// Close the file, releasing the descriptor.
    ///
    /// Fails with [`Error::Busy`] while an abandoned operation is still in
    /// flight and with [`Error::Closed`] if the file is already closed.
    /// Written data is already in the kernel — there is no user-space
    /// buffer to flush.
    pub fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::Closed);
        }
        self.reconcile_pending()?;
        self.file = None;
        Ok(())
    }

    fn require_open(&self) -> Result<Arc<File>> {
        self.file.clone().ok_or(Error::Closed)
    }

    /// Settle an operation whose future was dropped before completion.
    ///
    /// A still-running job keeps the file busy. A finished write moved the
    /// write offset — the disk changed, and any error went down with the
    /// dropped future. A finished read is discarded entirely: positioned
    /// reads consume nothing, so the same bytes are simply read again. A
    /// closed cell means the loop discarded the job unrun.
    fn reconcile_pending(&mut self) -> Result<()> {
        let advance = match &self.pending {
            None => return Ok(()),
            Some(PendingOp::Read(cell)) => match cell.probe() {
                Probe::Pending => return Err(Error::Busy),
                Probe::Done(_) | Probe::Closed => 0,
            },
            Some(PendingOp::Write(cell)) => match cell.probe() {
                Probe::Pending => return Err(Error::Busy),
                Probe::Done(outcome) => outcome.written as u64,
                Probe::Closed => 0,
            },
        };

        self.write_pos += advance;
        self.pending = None;
        Ok(())
    }
}

// ============================================================================
// Positioned I/O
// ============================================================================

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(unix)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

/// One positioned read of up to `len` bytes, retried on interruption.
fn read_chunk_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    let mut data = vec![0u8; len];
    loop {
        match pread(file, &mut data, offset) {
            Ok(n) => {
                data.truncate(n);
                return Ok(data);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Write all of `data` at `offset`, retrying partial writes.
///
/// Reports the bytes written even when the result is an error, so the
/// caller can keep its offset honest after a partial failure.
fn write_all_at(file: &File, offset: u64, data: &[u8]) -> WriteOutcome {
    let mut written = 0usize;
    while written < data.len() {
        match pwrite(file, &data[written..], offset + written as u64) {
            Ok(0) => {
                return WriteOutcome {
                    written,
                    result: Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    )),
                };
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return WriteOutcome {
                    written,
                    result: Err(e),
                }
            }
        }
    }
    WriteOutcome {
        written,
        result: Ok(()),
    }
}
