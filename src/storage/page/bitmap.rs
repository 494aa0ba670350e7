//! Bit-level helpers over an occupancy bitmap. Bit `i` lives in byte `i / 8`,
//! least significant bit first.

use crate::common::BITMAP_WIDTH;

/// Number of bytes needed to hold `bits` bits.
pub fn bytes_for(bits: usize) -> usize {
    bits.div_ceil(BITMAP_WIDTH)
}

pub fn is_set(bitmap: &[u8], pos: usize) -> bool {
    bitmap[pos / BITMAP_WIDTH] & mask(pos) != 0
}

pub fn set(bitmap: &mut [u8], pos: usize) {
    bitmap[pos / BITMAP_WIDTH] |= mask(pos);
}

pub fn reset(bitmap: &mut [u8], pos: usize) {
    bitmap[pos / BITMAP_WIDTH] &= !mask(pos);
}

/// Returns the lowest position below `max` whose bit equals `value`.
pub fn first_bit(bitmap: &[u8], value: bool, max: usize) -> Option<usize> {
    next_bit(bitmap, value, 0, max)
}

/// Returns the lowest position in `[from, max)` whose bit equals `value`.
pub fn next_bit(bitmap: &[u8], value: bool, from: usize, max: usize) -> Option<usize> {
    (from..max).find(|&pos| is_set(bitmap, pos) == value)
}

fn mask(pos: usize) -> u8 {
    1 << (pos % BITMAP_WIDTH)
}
