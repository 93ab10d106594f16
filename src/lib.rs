//! `int-ext-sort` is an external merge sort for files of fixed-width integer records.
//!
//! External sorting is required when the data being sorted do not fit into the main memory (RAM) of a computer
//! and instead must reside in slower external memory, usually a hard disk drive. Sorting is achieved in two
//! passes. During the first pass the file is sorted in blocks that fit into the memory budget, each block being
//! written back over the same byte range as a sorted run. During the second pass the runs are merged into the
//! destination file by a k-way heap merge reading every run through a small bounded buffer.
//! For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Record format:**
//!   files are flat sequences of 4-byte big-endian signed integers with no header or padding.
//! * **Bounded memory:**
//!   the memory budget sizes the sort block, while 80% of it is split between per-run read buffers and the
//!   output buffer during the merge.
//! * **In-place runs:**
//!   runs are written back into the input file, optionally into a scratch copy to keep the input intact.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use int_ext_sort::{verify_sorted, ExternalSorter, ExternalSorterBuilder, RecordGenerator};
//!
//! fn main() {
//!     let input = Path::new("integers.bin");
//!     let output = Path::new("integers_sorted.bin");
//!
//!     RecordGenerator::new(0, 1000).unwrap().generate(input, 10_000_000).unwrap();
//!
//!     let sorter: ExternalSorter = ExternalSorterBuilder::new()
//!         .with_memory_budget(16 * 1024 * 1024)
//!         .build()
//!         .unwrap();
//!
//!     let summary = sorter.sort(input, output).unwrap();
//!     println!("merged {} runs", summary.runs);
//!
//!     assert!(verify_sorted(output, 1024 * 1024).unwrap().is_sorted());
//! }
//! ```

pub mod buffer;
pub mod cursor;
pub mod generate;
pub mod merger;
pub mod record;
pub mod run;
pub mod sort;
pub mod verify;

pub use buffer::{BlockBuffer, OutputBuffer};
pub use cursor::RunCursor;
pub use generate::RecordGenerator;
pub use merger::{KWayMerger, MergeSummary};
pub use record::{Record, RECORD_WIDTH};
pub use run::{Run, RunBuilder};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError};
pub use verify::{verify_sorted, Verification, Violation};

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::Path;

    use crate::record;

    pub fn write_records(path: &Path, values: &[i32]) {
        let mut bytes = vec![0; values.len() * record::RECORD_WIDTH];
        for (i, &value) in values.iter().enumerate() {
            record::encode(&mut bytes, i * record::RECORD_WIDTH, value);
        }
        fs::write(path, bytes).unwrap();
    }

    pub fn read_records(path: &Path) -> Vec<i32> {
        let bytes = fs::read(path).unwrap();
        Vec::from_iter((0..bytes.len()).step_by(record::RECORD_WIDTH).map(|offset| record::decode(&bytes, offset)))
    }
}
