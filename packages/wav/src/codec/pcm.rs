//! Integer PCM and IEEE float sample conversions.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

/// Center and half-range of unsigned 8-bit samples
const PCM8_SCALE: f64 = 127.5;

/// Maps an unsigned 8-bit sample to `[-1, 1]`.
///
/// The range is centered on 127.5, so 0 and 255 reach full scale and 128
/// sits half a step above zero.
#[must_use]
pub fn u8_to_float(byte: u8) -> f32 {
    ((f64::from(byte) - PCM8_SCALE) / PCM8_SCALE) as f32
}

#[must_use]
pub fn float_to_u8(value: f32) -> u8 {
    let scaled = ((f64::from(value.clamp(-1.0, 1.0)) + 1.0) * PCM8_SCALE).round();
    scaled.clamp(0.0, 255.0) as u8
}

/// Normalizes a signed integer sample stored in `bits` bits.
#[must_use]
pub fn int_to_float(value: i32, bits: u32) -> f32 {
    (f64::from(value) / f64::from(1u32 << (bits - 1))) as f32
}

/// Quantizes a normalized sample to a signed integer of `bits` bits.
#[must_use]
pub fn float_to_int(value: f64, bits: u32) -> i32 {
    let max = f64::from(1u32 << (bits - 1));
    let scaled = (value.clamp(-1.0, 1.0) * max).round();
    scaled.clamp(-max, max - 1.0) as i32
}

#[must_use]
pub fn i16_to_float(value: i16) -> f32 {
    int_to_float(i32::from(value), 16)
}

#[must_use]
pub fn float_to_i16(value: f64) -> i16 {
    float_to_int(value, 16) as i16
}

/// Sign-extends a little-endian 24-bit sample.
#[must_use]
pub const fn i24_from_le(bytes: [u8; 3]) -> i32 {
    i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8
}

#[must_use]
pub const fn i24_to_le(value: i32) -> [u8; 3] {
    let bytes = value.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

#[must_use]
pub fn clamp_f32(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}

#[must_use]
pub fn clamp_f64(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}
