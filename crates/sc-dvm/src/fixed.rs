// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Saturating Q16.16 arithmetic.
//!
//! Every operation widens to `i64` before combining, so the only place a
//! value can leave the 32-bit range is the final [`clamp32`], which saturates
//! and raises the matching sticky flag. Native `+ - *` on `i32` never
//! appears in the data path.

use crate::fault::FaultFlags;

/// Q16.16 fixed-point value: real value = `v` / 65536.
pub type Fixed = i32;

/// Number of fractional bits.
pub const FIXED_SHIFT: u32 = 16;
/// 1.0 in Q16.16.
pub const FIXED_ONE: Fixed = 1 << FIXED_SHIFT;
/// 0.5 in Q16.16.
pub const FIXED_HALF: Fixed = 1 << (FIXED_SHIFT - 1);
/// 0.0 in Q16.16.
pub const FIXED_ZERO: Fixed = 0;
/// Largest representable value (+32767.99998474121).
pub const FIXED_MAX: Fixed = i32::MAX;
/// Smallest representable value (−32768.0).
pub const FIXED_MIN: Fixed = i32::MIN;
/// Smallest positive increment (2⁻¹⁶).
pub const FIXED_EPS: Fixed = 1;

/// Saturates a 64-bit value into the 32-bit range, flagging the direction.
pub fn clamp32(x: i64, faults: &mut FaultFlags) -> Fixed {
    if x > i64::from(i32::MAX) {
        faults.overflow = true;
        return i32::MAX;
    }
    if x < i64::from(i32::MIN) {
        faults.underflow = true;
        return i32::MIN;
    }
    x as i32
}

/// Saturating addition.
pub fn add32(a: Fixed, b: Fixed, faults: &mut FaultFlags) -> Fixed {
    clamp32(i64::from(a) + i64::from(b), faults)
}

/// Saturating subtraction.
pub fn sub32(a: Fixed, b: Fixed, faults: &mut FaultFlags) -> Fixed {
    clamp32(i64::from(a) - i64::from(b), faults)
}

/// Widening 32×32→64 multiply. Cannot overflow and never faults.
pub fn mul64(a: Fixed, b: Fixed) -> i64 {
    i64::from(a) * i64::from(b)
}

/// Arithmetic right shift with round-to-nearest, ties-to-even.
///
/// `shift` above 62 is a domain fault and yields 0. The discarded fraction
/// decides the rounding: below the halfway point truncate, above it round
/// away, exactly halfway round to the even neighbour. The result is clamped
/// into the 32-bit range.
pub fn round_shift_rne(x: i64, shift: u32, faults: &mut FaultFlags) -> Fixed {
    if shift > 62 {
        faults.domain = true;
        return 0;
    }
    if shift == 0 {
        return clamp32(x, faults);
    }

    let mask = (1i64 << shift) - 1;
    let halfway = 1i64 << (shift - 1);
    let frac = x & mask;
    let quot = x >> shift;

    let rounded = if frac < halfway {
        quot
    } else if frac > halfway {
        quot + 1
    } else {
        quot + (quot & 1)
    };
    clamp32(rounded, faults)
}

/// Q16.16 multiplication: widen, multiply, RNE-shift back by 16.
pub fn mul_q16(a: Fixed, b: Fixed, faults: &mut FaultFlags) -> Fixed {
    round_shift_rne(mul64(a, b), FIXED_SHIFT, faults)
}

/// Q16.16 division, truncating toward zero.
///
/// A zero denominator raises `div_zero` and yields 0.
pub fn div_q16(num: Fixed, denom: Fixed, faults: &mut FaultFlags) -> Fixed {
    if denom == 0 {
        faults.div_zero = true;
        return 0;
    }
    let scaled = i64::from(num) << FIXED_SHIFT;
    clamp32(scaled / i64::from(denom), faults)
}
