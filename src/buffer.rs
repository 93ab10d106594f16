//! Bounded record buffers.

use std::io::{self, prelude::*};

use crate::record::{self, Record, RECORD_WIDTH};

/// Block buffer used by the chunk-sort pass.
///
/// Holds one block of raw record bytes together with a scratch vector the records are
/// decoded into while sorting. Both are allocated once and reused for every block.
pub struct BlockBuffer {
    bytes: Vec<u8>,
    records: Vec<Record>,
}

impl BlockBuffer {
    /// Creates a block buffer holding up to `capacity` bytes, rounded down to whole records.
    /// At least one record always fits.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = record::align_down(capacity).max(RECORD_WIDTH);

        BlockBuffer {
            bytes: vec![0; capacity],
            records: Vec::with_capacity(capacity / RECORD_WIDTH),
        }
    }

    /// Returns buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the first `len` bytes of the block for filling.
    pub fn as_mut_bytes(&mut self, len: usize) -> &mut [u8] {
        &mut self.bytes[..len]
    }

    /// Returns the first `len` bytes of the block.
    pub fn as_bytes(&self, len: usize) -> &[u8] {
        &self.bytes[..len]
    }

    /// Sorts the whole records found in the first `len` bytes in place.
    /// Returns the number of bytes covered by those records; trailing partial bytes are left untouched.
    pub fn sort(&mut self, len: usize) -> usize {
        let count = len / RECORD_WIDTH;

        self.records.clear();
        self.records
            .extend((0..count).map(|i| record::decode(&self.bytes, i * RECORD_WIDTH)));
        self.records.sort_unstable();

        for (i, &value) in self.records.iter().enumerate() {
            record::encode(&mut self.bytes, i * RECORD_WIDTH, value);
        }

        return count * RECORD_WIDTH;
    }
}

/// Fixed-capacity output buffer.
/// Records are accumulated and written to the underlying writer in a single bulk write
/// whenever the buffer fills up.
pub struct OutputBuffer<W: Write> {
    writer: W,
    buffer: Vec<u8>,
    position: usize,
    written: u64,
}

impl<W: Write> OutputBuffer<W> {
    /// Creates an output buffer of `capacity` bytes, rounded down to whole records.
    pub fn new(writer: W, capacity: usize) -> Self {
        let capacity = record::align_down(capacity).max(RECORD_WIDTH);

        OutputBuffer {
            writer,
            buffer: vec![0; capacity],
            position: 0,
            written: 0,
        }
    }

    /// Returns buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Returns number of bytes handed to the writer so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Appends a record, flushing the buffer if it becomes full.
    pub fn push(&mut self, value: Record) -> io::Result<()> {
        record::encode(&mut self.buffer, self.position, value);
        self.position += RECORD_WIDTH;

        if self.position >= self.buffer.len() {
            self.flush()?;
        }

        return Ok(());
    }

    /// Writes buffered bytes to the writer and resets the buffer.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.position > 0 {
            self.writer.write_all(&self.buffer[..self.position])?;
            log::trace!("flushed {} bytes of output", self.position);
            self.written += self.position as u64;
            self.position = 0;
        }

        return Ok(());
    }

    /// Writes the remaining records and returns the underlying writer together with the total
    /// number of bytes written to it.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        self.flush()?;
        self.writer.flush()?;

        return Ok((self.writer, self.written));
    }
}

/// Reads into `buf` until it is full or the reader is exhausted.
/// Returns the number of bytes read, which is less than `buf.len()` only at end of input.
pub fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    return Ok(filled);
}

#[cfg(test)]
mod test {
    use std::io;

    use rstest::*;

    use super::{read_full, BlockBuffer, OutputBuffer};
    use crate::record;

    fn encode_all(values: &[i32]) -> Vec<u8> {
        let mut bytes = vec![0; values.len() * 4];
        for (i, &value) in values.iter().enumerate() {
            record::encode(&mut bytes, i * 4, value);
        }
        bytes
    }

    #[rstest]
    #[case(0, 4)]
    #[case(3, 4)]
    #[case(4, 4)]
    #[case(11, 8)]
    #[case(4096, 4096)]
    fn test_block_capacity(#[case] requested: usize, #[case] expected: usize) {
        assert_eq!(BlockBuffer::with_capacity(requested).capacity(), expected);
    }

    #[test]
    fn test_block_sort() {
        let input = encode_all(&[5, -3, 9, 1, 0]);
        let mut block = BlockBuffer::with_capacity(32);

        block.as_mut_bytes(input.len()).copy_from_slice(&input);
        let sorted_len = block.sort(input.len());

        assert_eq!(sorted_len, input.len());
        assert_eq!(block.as_bytes(sorted_len), encode_all(&[-3, 0, 1, 5, 9]).as_slice());
    }

    #[test]
    fn test_block_sort_ignores_partial_record() {
        let mut input = encode_all(&[2, 1]);
        input.extend_from_slice(&[0xde, 0xad]);
        let mut block = BlockBuffer::with_capacity(16);

        block.as_mut_bytes(input.len()).copy_from_slice(&input);
        let sorted_len = block.sort(input.len());

        assert_eq!(sorted_len, 8);
        assert_eq!(&block.as_bytes(input.len())[..8], encode_all(&[1, 2]).as_slice());
        assert_eq!(&block.as_bytes(input.len())[8..], &[0xde, 0xad]);
    }

    /// Writer recording the size of every write call.
    struct RecordingWriter {
        data: Vec<u8>,
        writes: Vec<usize>,
    }

    impl io::Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            self.writes.push(buf.len());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_buffer_flushes_when_full() {
        let writer = RecordingWriter {
            data: Vec::new(),
            writes: Vec::new(),
        };
        let mut output = OutputBuffer::new(writer, 9);
        assert_eq!(output.capacity(), 8);

        for value in [1, 2, 3, 4, 5] {
            output.push(value).unwrap();
        }
        assert_eq!(output.written(), 16);

        let (writer, written) = output.finish().unwrap();
        assert_eq!(written, 20);
        assert_eq!(writer.writes, vec![8, 8, 4]);
        assert_eq!(writer.data, encode_all(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_output_buffer_empty_finish() {
        let output = OutputBuffer::new(Vec::new(), 16);
        let (data, written) = output.finish().unwrap();
        assert!(data.is_empty());
        assert_eq!(written, 0);
    }

    /// Reader returning at most `step` bytes per call.
    struct TrickleReader<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl io::Read for TrickleReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[rstest]
    #[case(10, 8, 8)]
    #[case(5, 8, 5)]
    #[case(0, 8, 0)]
    fn test_read_full(#[case] available: usize, #[case] requested: usize, #[case] expected: usize) {
        let data = vec![7u8; available];
        let mut reader = TrickleReader { data: &data, step: 3 };
        let mut buf = vec![0u8; requested];

        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), expected);
        assert!(buf[..expected].iter().all(|&b| b == 7));
    }
}
