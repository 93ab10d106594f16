//! Fixed-width record codec.
//!
//! Records are 4-byte big-endian two's-complement integers stored back to back with
//! no header or separators.

/// Record value type.
pub type Record = i32;

/// Size of one encoded record in bytes.
pub const RECORD_WIDTH: usize = std::mem::size_of::<Record>();

/// Decodes the record starting at `offset`.
///
/// `buffer` must hold at least [`RECORD_WIDTH`] bytes past `offset`.
#[inline]
pub fn decode(buffer: &[u8], offset: usize) -> Record {
    let mut bytes = [0u8; RECORD_WIDTH];
    bytes.copy_from_slice(&buffer[offset..offset + RECORD_WIDTH]);
    Record::from_be_bytes(bytes)
}

/// Encodes `value` into `buffer` starting at `offset`.
#[inline]
pub fn encode(buffer: &mut [u8], offset: usize, value: Record) {
    buffer[offset..offset + RECORD_WIDTH].copy_from_slice(&value.to_be_bytes());
}

/// Rounds a byte count down to a whole number of records.
#[inline]
pub fn align_down(bytes: usize) -> usize {
    bytes - bytes % RECORD_WIDTH
}

/// Returns `true` if a byte length holds a whole number of records.
#[inline]
pub fn is_aligned(bytes: u64) -> bool {
    bytes % RECORD_WIDTH as u64 == 0
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::{align_down, decode, encode, is_aligned, Record};

    #[rstest]
    #[case(0, [0x00, 0x00, 0x00, 0x00])]
    #[case(1, [0x00, 0x00, 0x00, 0x01])]
    #[case(-1, [0xff, 0xff, 0xff, 0xff])]
    #[case(0x01020304, [0x01, 0x02, 0x03, 0x04])]
    #[case(Record::MIN, [0x80, 0x00, 0x00, 0x00])]
    #[case(Record::MAX, [0x7f, 0xff, 0xff, 0xff])]
    fn test_big_endian_layout(#[case] value: Record, #[case] bytes: [u8; 4]) {
        let mut buffer = vec![0xaa; 6];
        encode(&mut buffer, 1, value);

        assert_eq!(&buffer[1..5], &bytes);
        assert_eq!(buffer[0], 0xaa);
        assert_eq!(buffer[5], 0xaa);
        assert_eq!(decode(&buffer, 1), value);
    }

    #[test]
    fn test_reencode_is_noop() {
        let original: Vec<u8> = (0u8..16).map(|b| b.wrapping_mul(37)).collect();
        let mut buffer = original.clone();

        for offset in (0..buffer.len()).step_by(4) {
            let value = decode(&buffer, offset);
            encode(&mut buffer, offset, value);
        }

        assert_eq!(buffer, original);
    }

    #[test]
    fn test_alignment() {
        assert_eq!(align_down(0), 0);
        assert_eq!(align_down(3), 0);
        assert_eq!(align_down(9), 8);
        assert!(is_aligned(12));
        assert!(!is_aligned(13));
    }
}
