//! Bit distance between packed descriptors.

use crate::freak::Descriptor;

/// Number of differing bits. `None` when the descriptors have different
/// lengths.
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> Option<u32> {
    if a.bit_len() != b.bit_len() {
        return None;
    }
    Some(hamming_distance_bytes(a.as_bytes(), b.as_bytes()))
}

/// Bit distance over two equally long byte slices.
#[inline]
pub fn hamming_distance_bytes(a: &[u8], b: &[u8]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_differing_bits() {
        let mut a = Descriptor::zeros(666);
        let b = Descriptor::zeros(666);
        assert_eq!(hamming_distance(&a, &b), Some(0));
        for i in [0, 7, 8, 300, 665] {
            a.set(i, true);
        }
        assert_eq!(hamming_distance(&a, &b), Some(5));
        assert_eq!(hamming_distance(&b, &a), Some(5));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert_eq!(
            hamming_distance(&Descriptor::zeros(666), &Descriptor::zeros(512)),
            None
        );
    }

    #[test]
    fn byte_distance() {
        assert_eq!(hamming_distance_bytes(&[0xff, 0x0f], &[0x00, 0x0f]), 8);
        assert_eq!(hamming_distance_bytes(&[], &[]), 0);
    }
}
