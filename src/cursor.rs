//! Buffered forward-only reader over a single run.

use std::fs;
use std::io::{self, prelude::*, SeekFrom};
use std::path::{Path, PathBuf};

use crate::buffer;
use crate::record::{self, Record, RECORD_WIDTH};
use crate::run::Run;
use crate::sort::SortError;

/// Run cursor.
///
/// Streams the records of one run through a private fixed-capacity buffer, refilling it from
/// disk only when the buffer position wraps around to zero. Memory usage is bounded by the buffer
/// capacity regardless of the run length. The file handle is released as soon as the run is
/// exhausted.
pub struct RunCursor {
    run: Run,
    path: PathBuf,
    file: Option<fs::File>,
    buffer: Vec<u8>,
    /// Logical offset into the run, `0..=run.length`.
    offset: u64,
    /// Read position inside `buffer`; zero means a refill is due.
    buf_pos: usize,
    current: Option<Record>,
}

impl RunCursor {
    /// Opens a cursor over `run` stored in `path` using a buffer of `capacity` bytes.
    ///
    /// Capacity is rounded down to whole records, never exceeds the run length and always holds
    /// at least one record. No data is read until the first [`advance`](RunCursor::advance).
    pub fn open(path: &Path, run: Run, capacity: usize) -> Result<Self, SortError> {
        let capacity = record::align_down((capacity as u64).min(run.length) as usize).max(RECORD_WIDTH);

        let mut file = fs::File::open(path).map_err(|err| SortError::io(path, run.start, err))?;
        file.seek(SeekFrom::Start(run.start))
            .map_err(|err| SortError::io(path, run.start, err))?;

        return Ok(RunCursor {
            run,
            path: path.to_path_buf(),
            file: Some(file),
            buffer: vec![0; capacity],
            offset: 0,
            buf_pos: 0,
            current: None,
        });
    }

    /// Returns the run this cursor reads.
    pub fn run(&self) -> &Run {
        &self.run
    }

    /// Returns buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` while the run has records that were not yet returned.
    pub fn can_read(&self) -> bool {
        self.offset < self.run.length
    }

    /// Returns `true` once the run is exhausted and the file handle is released.
    pub fn is_exhausted(&self) -> bool {
        self.file.is_none()
    }

    /// Returns the record most recently returned by [`advance`](RunCursor::advance).
    pub fn current(&self) -> Option<Record> {
        self.current
    }

    /// Moves to the next record of the run and returns it.
    /// Returns `None` and releases the file handle once the run is exhausted.
    pub fn advance(&mut self) -> Result<Option<Record>, SortError> {
        if !self.can_read() {
            if self.file.take().is_some() {
                log::debug!("run {} exhausted", self.run.index);
            }
            self.current = None;
            return Ok(None);
        }

        if self.buf_pos == 0 {
            self.refill()?;
        }

        let value = record::decode(&self.buffer, self.buf_pos);
        self.buf_pos = (self.buf_pos + RECORD_WIDTH) % self.buffer.len();
        self.offset += RECORD_WIDTH as u64;
        self.current = Some(value);

        return Ok(Some(value));
    }

    fn refill(&mut self) -> Result<(), SortError> {
        let position = self.run.start + self.offset;
        let read_len = (self.buffer.len() as u64).min(self.run.length - self.offset) as usize;

        let file = self.file.as_mut().ok_or_else(|| {
            SortError::io(
                &self.path,
                position,
                io::Error::new(io::ErrorKind::Other, "run cursor file handle released"),
            )
        })?;

        file.seek(SeekFrom::Start(position))
            .map_err(|err| SortError::io(&self.path, position, err))?;
        let actual = buffer::read_full(file, &mut self.buffer[..read_len])
            .map_err(|err| SortError::io(&self.path, position, err))?;
        if actual < read_len {
            return Err(SortError::ShortRead {
                path: self.path.clone(),
                offset: position,
                expected: read_len,
                actual,
            });
        }

        log::trace!("run {} refilled ({} bytes at offset {})", self.run.index, read_len, position);

        return Ok(());
    }
}
