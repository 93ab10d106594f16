//! Sorted runs and the chunk-sort pass producing them.

use std::fs;
use std::io::{prelude::*, SeekFrom};
use std::path::Path;

use crate::buffer::{self, BlockBuffer};
use crate::record::{self, RECORD_WIDTH};
use crate::sort::SortError;

/// Sorted run descriptor: a contiguous byte range of the work file holding records
/// in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Run index, assigned in file order.
    pub index: usize,
    /// Byte offset of the first record.
    pub start: u64,
    /// Run length in bytes, always a whole number of records.
    pub length: u64,
}

impl Run {
    /// Byte offset just past the last record.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Number of records in the run.
    pub fn records(&self) -> u64 {
        self.length / RECORD_WIDTH as u64
    }
}

/// Chunk-sort pass.
///
/// Reads a file block by block, sorts each block in memory and writes it back over the same
/// byte range, so that after the pass the file is a concatenation of sorted runs.
pub struct RunBuilder {
    block_size: usize,
}

impl RunBuilder {
    /// Creates a run builder using blocks of at most `block_size` bytes.
    pub fn new(block_size: usize) -> Self {
        RunBuilder { block_size }
    }

    /// Creates a run builder that keeps the chunk-sort pass within `memory_budget` bytes.
    /// Half of the budget holds the raw block and half the records decoded from it.
    pub fn with_memory_budget(memory_budget: usize) -> Self {
        RunBuilder::new(memory_budget / 2)
    }

    /// Returns the maximum block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Sorts `path` in place block by block and returns the resulting runs.
    ///
    /// The file length must be a whole number of records, otherwise
    /// [`SortError::MalformedInput`] is returned before anything is written.
    pub fn build(&self, path: &Path) -> Result<Vec<Run>, SortError> {
        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| SortError::io(path, 0, err))?;

        let file_len = file.metadata().map_err(|err| SortError::io(path, 0, err))?.len();
        if !record::is_aligned(file_len) {
            return Err(SortError::MalformedInput {
                path: path.to_path_buf(),
                length: file_len,
            });
        }

        let mut runs = Vec::new();
        if file_len == 0 {
            log::info!("{} is empty, no runs to build", path.display());
            return Ok(runs);
        }

        let block_size = (self.block_size as u64).min(file_len) as usize;
        let mut block = BlockBuffer::with_capacity(block_size);
        log::info!(
            "building runs of {} (file size: {} bytes, block size: {} bytes)",
            path.display(),
            file_len,
            block.capacity()
        );

        let mut offset = 0;
        while offset < file_len {
            let read_len = (block.capacity() as u64).min(file_len - offset) as usize;

            file.seek(SeekFrom::Start(offset))
                .map_err(|err| SortError::io(path, offset, err))?;
            let actual = buffer::read_full(&mut file, block.as_mut_bytes(read_len))
                .map_err(|err| SortError::io(path, offset, err))?;
            if actual < read_len {
                return Err(SortError::ShortRead {
                    path: path.to_path_buf(),
                    offset,
                    expected: read_len,
                    actual,
                });
            }

            let sorted_len = block.sort(read_len);

            file.seek(SeekFrom::Start(offset))
                .map_err(|err| SortError::io(path, offset, err))?;
            file.write_all(block.as_bytes(sorted_len))
                .map_err(|err| SortError::io(path, offset, err))?;

            let run = Run {
                index: runs.len(),
                start: offset,
                length: sorted_len as u64,
            };
            log::debug!("run {} built ({} records at offset {})", run.index, run.records(), run.start);

            runs.push(run);
            offset += sorted_len as u64;
        }

        file.flush().map_err(|err| SortError::io(path, offset, err))?;

        return Ok(runs);
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::{Run, RunBuilder};
    use crate::sort::SortError;
    use crate::testing::{read_records, write_records};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_two_runs(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("input.bin");
        write_records(&path, &[5, 3, 9, 1, 4, 2]);

        let runs = RunBuilder::new(12).build(&path).unwrap();

        assert_eq!(
            runs,
            vec![
                Run {
                    index: 0,
                    start: 0,
                    length: 12
                },
                Run {
                    index: 1,
                    start: 12,
                    length: 12
                },
            ]
        );
        assert_eq!(read_records(&path), vec![3, 5, 9, 1, 2, 4]);
    }

    #[rstest]
    #[case(4, 7)]
    #[case(7, 7)]
    #[case(8, 4)]
    #[case(12, 3)]
    #[case(28, 1)]
    #[case(1 << 20, 1)]
    fn test_runs_cover_file(tmp_dir: tempfile::TempDir, #[case] block_size: usize, #[case] expected_runs: usize) {
        let path = tmp_dir.path().join("input.bin");
        let input = vec![7, -2, 7, 0, 11, -40, 3];
        write_records(&path, &input);

        let runs = RunBuilder::new(block_size).build(&path).unwrap();
        assert_eq!(runs.len(), expected_runs);

        let mut expected_start = 0;
        for (i, run) in runs.iter().enumerate() {
            assert_eq!(run.index, i);
            assert_eq!(run.start, expected_start);
            assert_eq!(run.length % 4, 0);
            expected_start = run.end();
        }
        assert_eq!(expected_start, 28);

        let output = read_records(&path);
        for run in &runs {
            let records = &output[(run.start / 4) as usize..(run.end() / 4) as usize];
            assert!(records.windows(2).all(|pair| pair[0] <= pair[1]));
        }

        let mut actual = output.clone();
        let mut expected = input.clone();
        actual.sort();
        expected.sort();
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case(24, 12, 2)]
    #[case(16, 8, 3)]
    #[case(4, 2, 6)]
    fn test_memory_budget_split(
        tmp_dir: tempfile::TempDir,
        #[case] memory_budget: usize,
        #[case] block_size: usize,
        #[case] expected_runs: usize,
    ) {
        let path = tmp_dir.path().join("input.bin");
        write_records(&path, &[5, 3, 9, 1, 4, 2]);

        let builder = RunBuilder::with_memory_budget(memory_budget);
        assert_eq!(builder.block_size(), block_size);

        let runs = builder.build(&path).unwrap();
        assert_eq!(runs.len(), expected_runs);
        assert!(runs.iter().all(|run| run.length as usize <= block_size.max(4)));
    }

    #[rstest]
    fn test_empty_file(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("input.bin");
        write_records(&path, &[]);

        let runs = RunBuilder::new(16).build(&path).unwrap();

        assert!(runs.is_empty());
    }

    #[rstest]
    fn test_malformed_file(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("input.bin");
        fs::write(&path, [0u8, 0, 0, 2, 0, 0, 0, 1, 0xff]).unwrap();

        let result = RunBuilder::new(4).build(&path);

        assert!(matches!(result, Err(SortError::MalformedInput { length: 9, .. })));
        assert_eq!(fs::read(&path).unwrap(), vec![0u8, 0, 0, 2, 0, 0, 0, 1, 0xff]);
    }
}
