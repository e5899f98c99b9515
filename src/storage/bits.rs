//! # Word-Level Bit Access
//!
//! Reads and writes of a `bits`-wide pattern at an absolute bit offset in a
//! slice of 64-bit words. The offset is `element_base + field_offset`, so
//! the caller never deals with word boundaries itself.
//!
//! ## Paths
//!
//! | Case | Access |
//! |------|--------|
//! | 64 bits on a word boundary | whole-word assign, no masking |
//! | 1 bit | single-bit test / set / clear |
//! | fits in one word | `mask = ((1 << bits) - 1) << shift` |
//! | straddles two words | low part from word `w`, high part from `w + 1` |
//!
//! Patterns are zero-extended on read; writes keep only the low `bits` of
//! the incoming pattern.

use crate::config::WORD_BITS;

#[inline]
pub(crate) fn mask(bits: u32) -> u64 {
    if bits >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

#[inline]
fn split(offset: usize) -> (usize, u32) {
    (offset / WORD_BITS as usize, (offset % WORD_BITS as usize) as u32)
}

#[inline]
pub(crate) fn read_bits(words: &[u64], offset: usize, bits: u32) -> u64 {
    let (word, shift) = split(offset);

    if shift == 0 && bits == WORD_BITS {
        return words[word];
    }
    if bits == 1 {
        return (words[word] >> shift) & 1;
    }
    if shift + bits <= WORD_BITS {
        return (words[word] >> shift) & mask(bits);
    }

    let low_bits = WORD_BITS - shift;
    let low = words[word] >> shift;
    let high = words[word + 1] & mask(bits - low_bits);
    low | (high << low_bits)
}

/// Stores the low `bits` of `raw` and returns the previous pattern.
#[inline]
pub(crate) fn write_bits(words: &mut [u64], offset: usize, bits: u32, raw: u64) -> u64 {
    let (word, shift) = split(offset);

    if shift == 0 && bits == WORD_BITS {
        return std::mem::replace(&mut words[word], raw);
    }
    if bits == 1 {
        let old = (words[word] >> shift) & 1;
        if raw & 1 == 1 {
            words[word] |= 1u64 << shift;
        } else {
            words[word] &= !(1u64 << shift);
        }
        return old;
    }

    let m = mask(bits);
    let raw = raw & m;
    if shift + bits <= WORD_BITS {
        let old = (words[word] >> shift) & m;
        words[word] = (words[word] & !(m << shift)) | (raw << shift);
        return old;
    }

    let low_bits = WORD_BITS - shift;
    let high_bits = bits - low_bits;
    let old = read_bits(words, offset, bits);
    words[word] = (words[word] & mask(shift)) | (raw << shift);
    words[word + 1] = (words[word + 1] & !mask(high_bits)) | (raw >> low_bits);
    old
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_word_fast_path() {
        let mut words = [0u64; 2];
        assert_eq!(write_bits(&mut words, 64, 64, u64::MAX - 1), 0);
        assert_eq!(words[1], u64::MAX - 1);
        assert_eq!(read_bits(&words, 64, 64), u64::MAX - 1);
    }

    #[test]
    fn single_bit_leaves_neighbours_alone() {
        let mut words = [0b1010u64];
        assert_eq!(write_bits(&mut words, 0, 1, 1), 0);
        assert_eq!(words[0], 0b1011);
        assert_eq!(write_bits(&mut words, 3, 1, 0), 1);
        assert_eq!(words[0], 0b0011);
        assert_eq!(read_bits(&words, 1, 1), 1);
    }

    #[test]
    fn sub_word_write_masks_incoming_pattern() {
        let mut words = [u64::MAX];
        write_bits(&mut words, 8, 8, 0x1FF);
        assert_eq!(read_bits(&words, 8, 8), 0xFF);
        write_bits(&mut words, 8, 8, 0x12);
        assert_eq!(read_bits(&words, 8, 8), 0x12);
        assert_eq!(words[0] & 0xFF, 0xFF);
        assert_eq!(words[0] >> 16, u64::MAX >> 16);
    }

    #[test]
    fn crossing_write_splits_across_two_words() {
        let mut words = [0u64; 2];
        let pattern = 0xAB_CDEF_0123u64;
        assert_eq!(write_bits(&mut words, 40, 40, pattern), 0);
        assert_eq!(words[0] >> 40, pattern & mask(24));
        assert_eq!(words[1], pattern >> 24);
        assert_eq!(read_bits(&words, 40, 40), pattern);
        assert_eq!(write_bits(&mut words, 40, 40, 7), pattern);
        assert_eq!(read_bits(&words, 40, 40), 7);
    }

    #[test]
    fn crossing_write_preserves_surrounding_bits() {
        let mut words = [u64::MAX; 2];
        write_bits(&mut words, 60, 10, 0);
        assert_eq!(words[0], mask(60));
        assert_eq!(words[1], u64::MAX << 6);
    }

    #[test]
    fn unaligned_full_width_value_crosses() {
        let mut words = [0u64; 3];
        write_bits(&mut words, 70, 64, u64::MAX);
        assert_eq!(read_bits(&words, 70, 64), u64::MAX);
        assert_eq!(words[0], 0);
        assert_eq!(words[1], u64::MAX << 6);
        assert_eq!(words[2], mask(6));
    }
}
