//! Sorted output verification.

use std::fs;
use std::path::Path;

use crate::buffer;
use crate::record::{self, Record, RECORD_WIDTH};
use crate::sort::SortError;

/// First pair of adjacent records found out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    /// Index of the offending record.
    pub index: u64,
    pub previous: Record,
    pub current: Record,
}

/// Verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// Number of records scanned.
    pub records: u64,
    pub first_violation: Option<Violation>,
}

impl Verification {
    /// Returns `true` if records are in non-decreasing order.
    pub fn is_sorted(&self) -> bool {
        self.first_violation.is_none()
    }
}

/// Streams `path` once and checks that its records are in non-decreasing order.
pub fn verify_sorted(path: &Path, buffer_size: usize) -> Result<Verification, SortError> {
    let mut file = fs::File::open(path).map_err(|err| SortError::io(path, 0, err))?;
    let file_len = file.metadata().map_err(|err| SortError::io(path, 0, err))?.len();
    if !record::is_aligned(file_len) {
        return Err(SortError::MalformedInput {
            path: path.to_path_buf(),
            length: file_len,
        });
    }

    let mut buf = vec![0u8; record::align_down(buffer_size).max(RECORD_WIDTH)];
    let mut previous: Option<Record> = None;
    let mut first_violation = None;
    let mut records = 0u64;
    let mut offset = 0u64;

    while offset < file_len {
        let read_len = (buf.len() as u64).min(file_len - offset) as usize;
        let actual = buffer::read_full(&mut file, &mut buf[..read_len])
            .map_err(|err| SortError::io(path, offset, err))?;
        if actual < read_len {
            return Err(SortError::ShortRead {
                path: path.to_path_buf(),
                offset,
                expected: read_len,
                actual,
            });
        }

        for pos in (0..read_len).step_by(RECORD_WIDTH) {
            let current = record::decode(&buf, pos);
            if let Some(previous) = previous {
                if current < previous && first_violation.is_none() {
                    first_violation = Some(Violation {
                        index: records,
                        previous,
                        current,
                    });
                }
            }
            previous = Some(current);
            records += 1;
        }

        offset += read_len as u64;
    }

    match &first_violation {
        Some(violation) => log::warn!(
            "{} is not sorted: record {} ({}) is less than its predecessor ({})",
            path.display(),
            violation.index,
            violation.current,
            violation.previous
        ),
        None => log::info!("{} is sorted ({} records)", path.display(), records),
    }

    return Ok(Verification {
        records,
        first_violation,
    });
}
