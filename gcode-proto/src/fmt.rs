//! No-std number formatting for status lines.
//!
//! These functions write digits directly into byte buffers without
//! requiring heap allocation or `core::fmt`.

/// Write a u32 as an unsigned decimal string.
///
/// Returns the number of bytes written (1-10 bytes).
///
/// # Panics
///
/// Panics if the buffer is shorter than the number of digits.
#[inline]
pub fn write_u32(buf: &mut [u8], value: u32) -> usize {
    // Digits in reverse order
    let mut temp = [0u8; 10];
    let mut n = value;
    let mut len = 0;
    loop {
        temp[len] = b'0' + (n % 10) as u8;
        n /= 10;
        len += 1;
        if n == 0 {
            break;
        }
    }

    for i in 0..len {
        buf[i] = temp[len - 1 - i];
    }
    len
}

/// Write a thousandths value (micrometres) as a decimal with three places
/// (millimetres), e.g. `-1250` as `-1.250`.
///
/// Returns the number of bytes written (5-12 bytes).
///
/// # Panics
///
/// Panics if `buf.len() < 12` (max size: "-2147483.648").
#[inline]
pub fn write_milli(buf: &mut [u8], value: i32) -> usize {
    debug_assert!(buf.len() >= 12, "buffer too small for milli value");

    let mut pos = 0;
    if value < 0 {
        buf[0] = b'-';
        pos = 1;
    }

    let magnitude = value.unsigned_abs();
    pos += write_u32(&mut buf[pos..], magnitude / 1000);

    let frac = magnitude % 1000;
    buf[pos] = b'.';
    buf[pos + 1] = b'0' + (frac / 100) as u8;
    buf[pos + 2] = b'0' + (frac / 10 % 10) as u8;
    buf[pos + 3] = b'0' + (frac % 10) as u8;
    pos + 4
}
