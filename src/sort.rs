//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::merger::{KWayMerger, MergeSummary};
use crate::run::RunBuilder;

/// Default memory budget: 500 MiB.
pub const DEFAULT_MEMORY_BUDGET: usize = 500 * 1024 * 1024;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Open, seek, read or write failure.
    IO {
        path: PathBuf,
        offset: u64,
        source: io::Error,
    },
    /// File length is not a whole number of records.
    MalformedInput { path: PathBuf, length: u64 },
    /// Fewer bytes were available than a run descriptor promised.
    ShortRead {
        path: PathBuf,
        offset: u64,
        expected: usize,
        actual: usize,
    },
    /// Invalid parameter passed by the caller.
    InvalidArgument(String),
}

impl SortError {
    pub(crate) fn io(path: &Path, offset: u64, source: io::Error) -> Self {
        SortError::IO {
            path: path.to_path_buf(),
            offset,
            source,
        }
    }
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::IO { source, .. } => Some(source),
            SortError::MalformedInput { .. } | SortError::ShortRead { .. } | SortError::InvalidArgument(_) => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::IO { path, offset, source } => {
                write!(f, "I/O operation failed ({} at offset {}): {}", path.display(), offset, source)
            }
            SortError::MalformedInput { path, length } => write!(
                f,
                "malformed input {}: length {} is not a multiple of the record width",
                path.display(),
                length
            ),
            SortError::ShortRead {
                path,
                offset,
                expected,
                actual,
            } => write!(
                f,
                "short read from {} at offset {}: expected {} bytes, got {}",
                path.display(),
                offset,
                expected,
                actual
            ),
            SortError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder {
    /// Total memory budget in bytes.
    memory_budget: usize,
    /// Whether runs are built in a scratch copy instead of the source file.
    preserve_input: bool,
    /// Directory to be used to store the scratch copy.
    tmp_dir: Option<Box<Path>>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(self.memory_budget, self.preserve_input, self.tmp_dir.as_deref())
    }

    /// Sets total memory budget in bytes.
    pub fn with_memory_budget(mut self, memory_budget: usize) -> ExternalSorterBuilder {
        self.memory_budget = memory_budget;
        return self;
    }

    /// Keeps the source file untouched by building runs in a scratch copy.
    pub fn with_preserve_input(mut self, preserve_input: bool) -> ExternalSorterBuilder {
        self.preserve_input = preserve_input;
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            memory_budget: DEFAULT_MEMORY_BUDGET,
            preserve_input: false,
            tmp_dir: None,
        }
    }
}

/// External sorter.
///
/// Sorts a file of fixed-width records in two phases: the file is split into blocks that fit
/// into the memory budget, each block is sorted and written back in place as a run, then all
/// runs are merged into the destination file.
pub struct ExternalSorter {
    /// Total memory budget in bytes.
    memory_budget: usize,
    /// Scratch directory, present when the source file must not be modified.
    tmp_dir: Option<tempfile::TempDir>,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `memory_budget` - Total memory budget in bytes. While building runs, half of it holds the raw
    ///   block and half the decoded records the block is sorted in, so runs are at most
    ///   `memory_budget / 2` bytes long. During the merge 80% of it is split between per-run read
    ///   buffers and the output buffer.
    /// * `preserve_input` - If set, runs are built in a scratch copy of the source file.
    /// * `tmp_path` - Directory to be used to store the scratch copy. If parameter is [`None`] default
    ///   OS temporary directory will be used.
    pub fn new(memory_budget: usize, preserve_input: bool, tmp_path: Option<&Path>) -> Result<Self, SortError> {
        let tmp_dir = if preserve_input {
            Some(Self::init_tmp_directory(tmp_path)?)
        } else {
            None
        };

        return Ok(ExternalSorter { memory_budget, tmp_dir });
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Returns the memory budget in bytes.
    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    /// Sorts records from `source` into `dest`.
    ///
    /// Unless the sorter was built with `preserve_input`, `source` is overwritten with the
    /// sorted runs and must not be the same file as `dest`. On failure the destination may hold
    /// partial output.
    ///
    /// # Arguments
    /// * `source` - File of unsorted records
    /// * `dest` - File the sorted records are written to
    pub fn sort(&self, source: &Path, dest: &Path) -> Result<MergeSummary, SortError> {
        log::info!(
            "sorting {} into {} (memory budget: {} bytes)",
            source.display(),
            dest.display(),
            self.memory_budget
        );

        if self.tmp_dir.is_none() && is_same_file(source, dest)? {
            return Err(SortError::InvalidArgument(format!(
                "{} cannot be sorted onto itself without preserving the input",
                source.display()
            )));
        }

        let work_path = self.prepare_work_file(source)?;

        let started = Instant::now();
        let runs = RunBuilder::with_memory_budget(self.memory_budget).build(&work_path)?;
        log::info!("built {} runs in {:.3}s", runs.len(), started.elapsed().as_secs_f64());

        let started = Instant::now();
        let summary = KWayMerger::new(&work_path, &runs, self.memory_budget)?.merge_into(dest)?;
        log::info!(
            "merged {} records in {:.3}s",
            summary.records,
            started.elapsed().as_secs_f64()
        );

        if work_path != source {
            fs::remove_file(&work_path).map_err(|err| SortError::io(&work_path, 0, err))?;
        }

        return Ok(summary);
    }

    fn prepare_work_file(&self, source: &Path) -> Result<PathBuf, SortError> {
        let tmp_dir = match &self.tmp_dir {
            Some(tmp_dir) => tmp_dir,
            None => return Ok(source.to_path_buf()),
        };

        let work_path = tmp_dir.path().join("runs.bin");
        log::debug!("copying {} to {}", source.display(), work_path.display());
        fs::copy(source, &work_path).map_err(|err| SortError::io(source, 0, err))?;

        return Ok(work_path);
    }
}

/// Returns `true` if both paths resolve to the same existing file.
fn is_same_file(source: &Path, dest: &Path) -> Result<bool, SortError> {
    let source = fs::canonicalize(source).map_err(|err| SortError::io(source, 0, err))?;
    let dest = match fs::canonicalize(dest) {
        Ok(dest) => dest,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(SortError::io(dest, 0, err)),
    };

    return Ok(source == dest);
}
