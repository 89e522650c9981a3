//! Output data sinks.
//!
//! The container backends need random access to the output: box sizes are
//! patched after the payload is written and fast-start relocates the `moov`
//! box by reading back what was already written. A sink therefore has to be
//! readable, writable, and seekable; `MuxSession::init` rejects any sink that
//! is not.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{MuxError, MuxResult};

/// Byte-level output used by a container backend.
pub trait DataSink: Read + Write + Seek + Send {
    fn is_readable(&mut self) -> bool;

    fn is_writable(&mut self) -> bool;

    fn is_seekable(&mut self) -> bool {
        self.stream_position().is_ok()
    }
}

/// File-backed sink.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    readable: bool,
    writable: bool,
}

impl FileSink {
    /// Create (or truncate) `path`, opened for reading and writing.
    pub fn create(path: impl AsRef<Path>) -> MuxResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                MuxError::IoError(io::Error::new(
                    e.kind(),
                    format!("Failed to create output file {:?}: {}", path, e),
                ))
            })?;
        Ok(Self {
            file,
            readable: true,
            writable: true,
        })
    }

    /// Wrap an already opened file, probing its access mode.
    ///
    /// The probe issues zero-length reads and writes, which the kernel
    /// rejects with `EBADF` when the descriptor lacks that permission.
    pub fn from_file(mut file: File) -> Self {
        let readable = file.read(&mut []).is_ok();
        let writable = file.write(&[]).is_ok();
        Self {
            file,
            readable,
            writable,
        }
    }

    pub fn into_inner(self) -> File {
        self.file
    }
}

impl Read for FileSink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }
}

impl Seek for FileSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl DataSink for FileSink {
    fn is_readable(&mut self) -> bool {
        self.readable
    }

    fn is_writable(&mut self) -> bool {
        self.writable
    }
}

/// In-memory sink; clones share the same buffer so the caller can inspect
/// the output after the session has consumed its handle.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Cursor<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().get_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Read for MemorySink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.lock().read(buf)
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemorySink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.lock().seek(pos)
    }
}

impl DataSink for MemorySink {
    fn is_readable(&mut self) -> bool {
        true
    }

    fn is_writable(&mut self) -> bool {
        true
    }
}

/// Reject sinks that cannot support random-access container writing.
pub(crate) fn validate_sink(sink: &mut dyn DataSink) -> MuxResult<()> {
    if !sink.is_readable() || !sink.is_writable() {
        return Err(MuxError::InvalidParameter(
            "Output sink must be opened for reading and writing".into(),
        ));
    }
    if !sink.is_seekable() {
        return Err(MuxError::InvalidParameter(
            "Output sink must be seekable".into(),
        ));
    }
    Ok(())
}
