//! Fixed-point decoding of accumulated decimal digits.
//!
//! The parser never builds a float. It keeps every digit of a number in an
//! integer mantissa and counts the digits after the decimal point; this
//! module turns that pair into an integer in the caller's unit, e.g.
//! millimetres in, micrometres out.
//!
//! Range and precision with [`MM_TO_UM`]: exact up to 42 000 mm, 10 µm
//! steps at 420 000 mm, 100 µm steps at 4 200 000 mm. Beyond `i32` the
//! result saturates.

/// Multiplier converting millimetre input to micrometres.
pub const MM_TO_UM: u16 = 1000;

/// Multiplier for values already in native units (feed rates).
pub const NATIVE: u16 = 1;

/// Convert `mantissa * 10^-(fraction_digits - 1)` to an integer scaled by
/// `multiplier`.
///
/// `fraction_digits` uses the parser's biased count: 0 means no decimal
/// point, 1 means a point with no digits after it, and `n` means `n - 1`
/// digits after it.
///
/// Whole powers of ten in `multiplier` are spent on fraction digits first,
/// so `1.25` mm becomes `125 * 10` rather than `125 * 1000 / 100`. Whatever
/// fraction remains is divided out rounding half up.
///
/// # Example
///
/// ```
/// use gcode_proto::decimal::{decode_fixed, MM_TO_UM};
///
/// // "1.25" mm
/// assert_eq!(decode_fixed(125, 3, false, MM_TO_UM), 1250);
/// ```
#[must_use]
pub fn decode_fixed(mantissa: u32, fraction_digits: u8, negative: bool, multiplier: u16) -> i32 {
    let mut exponent = fraction_digits.saturating_sub(1);
    let mut multiplier = multiplier;

    while exponent != 0 && multiplier % 10 == 0 {
        multiplier /= 10;
        exponent -= 1;
    }

    // Cannot overflow: u32::MAX * u16::MAX < 2^48
    let mut value = u64::from(mantissa) * u64::from(multiplier);

    if exponent != 0 {
        value = match 10u64.checked_pow(u32::from(exponent)) {
            Some(divisor) => (value + divisor / 2) / divisor,
            // More fraction digits than u64 can scale: rounds to zero.
            None => 0,
        };
    }

    let magnitude = i32::try_from(value).unwrap_or(i32::MAX);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}
