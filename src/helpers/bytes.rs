//! Little-endian readers over raw byte slices.
//! Callers slice exactly the width they read; the compound file and BIFF8 readers
//! bounds-check before calling in.

/// Splits a byte slice into 32-bit little-endian values, widened to `usize`.
/// A trailing partial chunk is ignored.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl ExactSizeIterator<Item = usize> + '_ {
    bytes.chunks_exact(4).map(|chunk| to_u32(chunk) as usize)
}

#[inline]
pub(crate) fn to_u16(s: &[u8]) -> u16 {
    u16::from_le_bytes([s[0], s[1]])
}

#[inline]
pub(crate) fn to_u32(s: &[u8]) -> u32 {
    u32::from_le_bytes([s[0], s[1], s[2], s[3]])
}

#[inline]
pub(crate) fn to_u64(s: &[u8]) -> u64 {
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(&s[..8]);
    u64::from_le_bytes(buffer)
}

#[inline]
pub(crate) fn to_f64(s: &[u8]) -> f64 {
    f64::from_bits(to_u64(s))
}

#[inline]
pub(crate) fn to_usize(s: &[u8]) -> usize {
    to_u32(s) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_values() {
        assert_eq!(to_u16(&[0x34, 0x12]), 0x1234);
        assert_eq!(to_u32(&[0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
        assert_eq!(to_usize(&[0x01, 0x00, 0x00, 0x00, 0xFF]), 1);
        assert_eq!(to_f64(&1.5f64.to_le_bytes()), 1.5);
    }

    #[test]
    fn usize_iter_drops_partial_chunk() {
        let values: Vec<usize> = to_usize_iter(&[1, 0, 0, 0, 2, 0, 0, 0, 9]).collect();
        assert_eq!(values, vec![1, 2]);
    }
}
