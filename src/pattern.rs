//! Deterministic byte pattern written by every chunk.

/// Byte expected at `offset` in a file made of `chunk_len`-sized copies of
/// the pattern
#[inline]
pub fn expected_byte(offset: u64, chunk_len: u64) -> u8 {
    (offset % chunk_len) as u8
}

/// Fill `buffer` so that `buffer[i] == i mod 256`
pub fn fill_pattern(buffer: &mut [u8]) {
    for (index, byte) in buffer.iter_mut().enumerate() {
        *byte = index as u8;
    }
}
