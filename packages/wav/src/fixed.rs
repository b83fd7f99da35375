//! Saturating 16-bit fixed-point primitives.
//!
//! These follow the GSM 06.10 reference arithmetic exactly: results are
//! clamped to the `i16` range instead of wrapping, and shifts by negative
//! amounts reverse direction.

#![allow(clippy::cast_possible_truncation)]

const fn saturate(value: i32) -> i16 {
    if value > i16::MAX as i32 {
        i16::MAX
    } else if value < i16::MIN as i32 {
        i16::MIN
    } else {
        value as i16
    }
}

#[must_use]
pub const fn add(a: i16, b: i16) -> i16 {
    saturate(a as i32 + b as i32)
}

#[must_use]
pub const fn sub(a: i16, b: i16) -> i16 {
    saturate(a as i32 - b as i32)
}

/// Rounding Q15 multiply: `(a * b + 16384) >> 15`.
///
/// `MIN * MIN` saturates to `MAX`.
#[must_use]
pub const fn mult_r(a: i16, b: i16) -> i16 {
    if a == i16::MIN && b == i16::MIN {
        return i16::MAX;
    }
    ((a as i32 * b as i32 + 16_384) >> 15) as i16
}

/// Absolute value with `MIN` mapped to `MAX`.
#[must_use]
pub const fn abs(a: i16) -> i16 {
    if a == i16::MIN { i16::MAX } else { a.abs() }
}

/// Arithmetic shift left; negative `n` shifts right.
#[must_use]
pub const fn asl(a: i16, n: i16) -> i16 {
    if n >= 16 {
        return 0;
    }
    if n <= -16 {
        return if a < 0 { -1 } else { 0 };
    }
    if n < 0 {
        return asr(a, -n);
    }
    ((a as i32) << n) as i16
}

/// Arithmetic shift right; negative `n` shifts left.
#[must_use]
pub const fn asr(a: i16, n: i16) -> i16 {
    if n >= 16 {
        return if a < 0 { -1 } else { 0 };
    }
    if n <= -16 {
        return 0;
    }
    if n < 0 {
        return ((a as i32) << -n) as i16;
    }
    a >> n
}
