//! In-place byte order reversal for keyword payloads.
//!
//! Element sizes are restricted to 1, 2, 4 and 8 bytes. Any other width
//! means the caller broke the type model and is a panic, not an error.

use log::trace;

const MASK_BYTES_HI: u64 = 0xFF00_FF00_FF00_FF00;
const MASK_BYTES_LO: u64 = 0x00FF_00FF_00FF_00FF;
const MASK_WORDS_HI: u64 = 0xFFFF_0000_FFFF_0000;
const MASK_WORDS_LO: u64 = 0x0000_FFFF_0000_FFFF;

/// Reverses the byte order of `count` elements of `element_size` bytes at
/// the start of `buffer`.
///
/// Four byte elements are swapped two at a time through one 64 bit word;
/// an odd trailing element is swapped on its own.
///
/// # Panics
/// Panics if `element_size` is not 1, 2, 4 or 8, or if the buffer holds
/// fewer than `count` elements.
pub fn flip_buffer(buffer: &mut [u8], element_size: usize, count: usize) {
    let bytes = element_size * count;
    assert!(
        buffer.len() >= bytes,
        "endian flip of {count} x {element_size} bytes on a {} byte buffer",
        buffer.len()
    );
    let buffer = &mut buffer[..bytes];
    trace!("Flipping {} elements of {} bytes", count, element_size);

    match element_size {
        1 => {}
        2 => buffer.chunks_exact_mut(2).for_each(|e| e.swap(0, 1)),
        4 => flip_pairs_of_u32(buffer),
        8 => buffer.chunks_exact_mut(8).for_each(|e| e.reverse()),
        _ => panic!("endian flip called with unsupported element size {element_size}"),
    }
}

fn flip_pairs_of_u32(buffer: &mut [u8]) {
    let mut pairs = buffer.chunks_exact_mut(8);
    for chunk in &mut pairs {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let mut x = u64::from_ne_bytes(word);
        x = ((x << 8) & MASK_BYTES_HI) | ((x >> 8) & MASK_BYTES_LO);
        x = ((x << 16) & MASK_WORDS_HI) | ((x >> 16) & MASK_WORDS_LO);
        chunk.copy_from_slice(&x.to_ne_bytes());
    }
    let tail = pairs.into_remainder();
    if !tail.is_empty() {
        tail.reverse();
    }
}

/// Flips a single 16 bit value.
pub fn flip16(value: u16) -> u16 {
    value.swap_bytes()
}

/// Flips a single 32 bit value.
pub fn flip32(value: u32) -> u32 {
    value.swap_bytes()
}

/// Flips a single 64 bit value.
pub fn flip64(value: u64) -> u64 {
    value.swap_bytes()
}
