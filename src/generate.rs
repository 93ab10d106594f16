//! Random record file generator.

use std::fs;
use std::io::prelude::*;
use std::path::Path;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::record::{self, Record, RECORD_WIDTH};
use crate::sort::SortError;

/// Default generator write buffer size: 1 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Writes files of uniformly distributed random records.
pub struct RecordGenerator {
    /// Smallest generated value.
    min: Record,
    /// Upper bound of generated values, exclusive.
    max: Record,
    /// Random generator seed. Entropy is used if not set.
    seed: Option<u64>,
    /// Write buffer size in bytes.
    buffer_size: usize,
}

impl RecordGenerator {
    /// Creates a generator of records in `min..max`.
    pub fn new(min: Record, max: Record) -> Result<Self, SortError> {
        if min >= max {
            return Err(SortError::InvalidArgument(format!(
                "empty value range {}..{}",
                min, max
            )));
        }

        return Ok(RecordGenerator {
            min,
            max,
            seed: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        });
    }

    /// Sets random generator seed making generated files reproducible.
    pub fn with_seed(mut self, seed: u64) -> RecordGenerator {
        self.seed = Some(seed);
        return self;
    }

    /// Sets write buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> RecordGenerator {
        self.buffer_size = buffer_size;
        return self;
    }

    /// Writes `records` random records to `path`, replacing its previous contents.
    pub fn generate(&self, path: &Path, records: u64) -> Result<(), SortError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let values = Uniform::new(self.min, self.max);

        let mut file = fs::File::create(path).map_err(|err| SortError::io(path, 0, err))?;
        let mut buffer = vec![0u8; record::align_down(self.buffer_size).max(RECORD_WIDTH)];

        log::info!(
            "generating {} records in range {}..{} into {}",
            records,
            self.min,
            self.max,
            path.display()
        );

        let mut offset = 0;
        let mut remaining = records;
        while remaining > 0 {
            let count = remaining.min((buffer.len() / RECORD_WIDTH) as u64) as usize;
            for i in 0..count {
                record::encode(&mut buffer, i * RECORD_WIDTH, values.sample(&mut rng));
            }

            let len = count * RECORD_WIDTH;
            file.write_all(&buffer[..len])
                .map_err(|err| SortError::io(path, offset, err))?;

            offset += len as u64;
            remaining -= count as u64;
        }

        file.flush().map_err(|err| SortError::io(path, offset, err))?;

        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::RecordGenerator;
    use crate::sort::SortError;
    use crate::testing::read_records;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(7)]
    #[case(1000)]
    fn test_generate(tmp_dir: tempfile::TempDir, #[case] records: u64) {
        let path = tmp_dir.path().join("random.bin");

        RecordGenerator::new(-10, 10)
            .unwrap()
            .with_buffer_size(12)
            .generate(&path, records)
            .unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), records * 4);
        assert!(read_records(&path).iter().all(|v| (-10..10).contains(v)));
    }

    #[rstest]
    fn test_generate_seeded(tmp_dir: tempfile::TempDir) {
        let first = tmp_dir.path().join("first.bin");
        let second = tmp_dir.path().join("second.bin");
        let generator = RecordGenerator::new(0, 1000).unwrap().with_seed(42);

        generator.generate(&first, 500).unwrap();
        generator.with_buffer_size(64).generate(&second, 500).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[rstest]
    #[case(0, 0)]
    #[case(5, -5)]
    fn test_empty_range(#[case] min: i32, #[case] max: i32) {
        assert!(matches!(RecordGenerator::new(min, max), Err(SortError::InvalidArgument(_))));
    }
}
