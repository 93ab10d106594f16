//! K-way run merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs;
use std::path::Path;

use crate::buffer::OutputBuffer;
use crate::cursor::RunCursor;
use crate::record::{self, Record, RECORD_WIDTH};
use crate::run::Run;
use crate::sort::SortError;

/// Share of the memory budget given to merge buffers, in percent.
const MERGE_MEMORY_PERCENT: u64 = 80;

/// Merge result statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of merged runs.
    pub runs: usize,
    /// Number of records written.
    pub records: u64,
    /// Number of bytes written.
    pub bytes: u64,
    /// Buffer capacity assigned to each run cursor, in bytes.
    pub cursor_buffer_size: usize,
    /// Output buffer capacity, in bytes.
    pub output_buffer_size: usize,
}

/// K-way merger.
///
/// Owns one [`RunCursor`] per run and merges them using a min-heap keyed by each cursor's current
/// record. Heap entries are `(record, cursor index)` pairs, so equal records are taken from the
/// lower run index first.
/// Time complexity is *m* \* log(*k*) where *m* is the number of records and *k* the number of runs.
pub struct KWayMerger {
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    heap: BinaryHeap<Reverse<(Record, usize)>>,
    cursors: Vec<RunCursor>,
    cursor_buffer_size: usize,
    output_buffer_size: usize,
    total_bytes: u64,
}

impl KWayMerger {
    /// Opens a cursor for every run and primes the heap with the first record of each.
    /// Runs must be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `path` - File holding the runs
    /// * `runs` - Run descriptors produced by the chunk-sort pass
    /// * `memory_budget` - Total memory budget split between cursor buffers and the output buffer
    pub fn new(path: &Path, runs: &[Run], memory_budget: usize) -> Result<Self, SortError> {
        let cursor_buffer_size = Self::cursor_buffer_size(memory_budget, runs.len());
        let output_buffer_size = Self::output_buffer_size(memory_budget);
        let total_bytes = runs.iter().map(|run| run.length).sum();

        log::info!(
            "merging {} runs (cursor buffer: {} bytes, output buffer: {} bytes)",
            runs.len(),
            cursor_buffer_size,
            output_buffer_size
        );

        let mut cursors = Vec::with_capacity(runs.len());
        let mut heap = BinaryHeap::with_capacity(runs.len());

        for run in runs {
            let mut cursor = RunCursor::open(path, *run, cursor_buffer_size)?;
            if let Some(value) = cursor.advance()? {
                heap.push(Reverse((value, cursors.len())));
            }
            cursors.push(cursor);
        }

        return Ok(KWayMerger {
            heap,
            cursors,
            cursor_buffer_size,
            output_buffer_size,
            total_bytes,
        });
    }

    /// Buffer capacity of each run cursor: 80% of the budget split evenly between runs,
    /// rounded down to whole records. Never smaller than one record.
    pub fn cursor_buffer_size(memory_budget: usize, runs: usize) -> usize {
        let share = merge_share(memory_budget) / runs.max(1) as u64;
        let size = record::align_down(share.min(usize::MAX as u64) as usize);

        if size < RECORD_WIDTH {
            log::warn!(
                "memory budget of {} bytes is too small for {} runs, using one-record cursor buffers",
                memory_budget,
                runs
            );
            return RECORD_WIDTH;
        }

        return size;
    }

    /// Output buffer capacity: 80% of the budget rounded down to whole records.
    /// Never smaller than one record.
    pub fn output_buffer_size(memory_budget: usize) -> usize {
        let size = record::align_down(merge_share(memory_budget).min(usize::MAX as u64) as usize);

        return size.max(RECORD_WIDTH);
    }

    /// Merges all remaining records into `dest`, replacing its previous contents.
    /// Records already taken through the [`Iterator`] implementation are not written.
    pub fn merge_into(mut self, dest: &Path) -> Result<MergeSummary, SortError> {
        let file = fs::File::create(dest).map_err(|err| SortError::io(dest, 0, err))?;

        // never allocate more than the whole output
        let capacity = (self.output_buffer_size as u64).min(self.total_bytes) as usize;
        let mut output = OutputBuffer::new(file, capacity);

        while let Some(Reverse((value, idx))) = self.heap.pop() {
            output
                .push(value)
                .map_err(|err| SortError::io(dest, output.written(), err))?;
            self.requeue(idx)?;
        }

        let written = output.written();
        let (_, bytes) = output.finish().map_err(|err| SortError::io(dest, written, err))?;

        log::debug!("wrote {} bytes to {}", bytes, dest.display());

        return Ok(MergeSummary {
            runs: self.cursors.len(),
            records: bytes / RECORD_WIDTH as u64,
            bytes,
            cursor_buffer_size: self.cursor_buffer_size,
            output_buffer_size: self.output_buffer_size,
        });
    }

    fn requeue(&mut self, idx: usize) -> Result<(), SortError> {
        if let Some(value) = self.cursors[idx].advance()? {
            self.heap.push(Reverse((value, idx)));
        }

        return Ok(());
    }
}

impl Iterator for KWayMerger {
    type Item = Result<Record, SortError>;

    /// Returns the next record from the runs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((value, idx)) = self.heap.pop()?;

        if let Err(err) = self.requeue(idx) {
            return Some(Err(err));
        }

        return Some(Ok(value));
    }
}

fn merge_share(memory_budget: usize) -> u64 {
    memory_budget as u64 * MERGE_MEMORY_PERCENT / 100
}
