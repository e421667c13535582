//! Bit-level helpers over key paths. Bits are read most-significant first.

/// Whether the bit at `position` is set, i.e. the path turns right at that depth
#[inline]
pub(crate) fn is_right(path: &[u8], position: usize) -> bool {
    (path[position / 8] >> (7 - position % 8)) & 1 == 1
}

/// Set the bit at `position`
#[inline]
pub(crate) fn set_bit(data: &mut [u8], position: usize) {
    data[position / 8] |= 1 << (7 - position % 8);
}

/// Number of leading bits two paths share
pub(crate) fn count_common_prefix(a: &[u8], b: &[u8]) -> usize {
    let mut count = 0;
    for (x, y) in a.iter().zip(b) {
        let diff = x ^ y;
        if diff != 0 {
            return count + diff.leading_zeros() as usize;
        }
        count += 8;
    }
    count
}
