//! Conversion between raw proof buffers and the 256-bit word arrays the
//! verifier contract takes.

use alloy_primitives::U256;
use thiserror::Error;

/// Size of one verifier word in bytes.
pub const WORD_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer of {0} bytes is not a multiple of {WORD_SIZE}")]
pub struct WordAlignmentError(pub usize);

/// Splits `buf` into 32-byte little-endian words.
///
/// Fails without producing any words if the length is not a multiple of
/// [`WORD_SIZE`].
pub fn buffer_to_words(buf: &[u8]) -> Result<Vec<U256>, WordAlignmentError> {
    if buf.len() % WORD_SIZE != 0 {
        return Err(WordAlignmentError(buf.len()));
    }

    Ok(buf.chunks_exact(WORD_SIZE).map(U256::from_le_slice).collect())
}

/// Inverse of [`buffer_to_words`].
pub fn words_to_buffer(words: &[U256]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(words.len() * WORD_SIZE);
    for word in words {
        buf.extend_from_slice(&word.to_le_bytes::<WORD_SIZE>());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_byte_is_least_significant() {
        let mut buf = vec![0u8; 64];
        buf[0] = 1;
        buf[32] = 0x02;
        buf[33] = 0x01;

        let words = buffer_to_words(&buf).unwrap();

        assert_eq!(words, vec![U256::from(1u64), U256::from(0x0102u64)]);
    }

    #[test]
    fn test_words_restore_original_buffer() {
        let buf: Vec<u8> = (0..96u8).collect();

        let words = buffer_to_words(&buf).unwrap();
        assert_eq!(words.len(), 3);
        assert_eq!(words_to_buffer(&words), buf);
    }

    #[test]
    fn test_empty_buffer_has_no_words() {
        assert_eq!(buffer_to_words(&[]), Ok(vec![]));
    }

    #[test]
    fn test_misaligned_lengths_rejected() {
        for len in [1, 31, 33, 63, 65, 100] {
            let buf = vec![0xffu8; len];
            assert_eq!(
                buffer_to_words(&buf),
                Err(WordAlignmentError(len)),
                "length {len} should be rejected"
            );
        }
    }
}
