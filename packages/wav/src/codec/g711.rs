//! ITU-T G.711 A-law and mu-law companding.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

const SIGN_BIT: u8 = 0x80;
const QUANT_MASK: u8 = 0x0F;
const SEG_SHIFT: u8 = 4;
const SEG_MASK: u8 = 0x70;

const MULAW_BIAS: i32 = 0x84;
const MULAW_CLIP: i32 = 8159;
const ALAW_CLIP: i32 = 0x0FFF;

const MULAW_SEG_END: [i32; 8] = [0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF, 0x1FFF];
const ALAW_SEG_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];

static ALAW_DECODE: [i16; 256] = build_table(false);
static MULAW_DECODE: [i16; 256] = build_table(true);

const fn build_table(mulaw: bool) -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = if mulaw {
            mulaw_expand(i as u8)
        } else {
            alaw_expand(i as u8)
        };
        i += 1;
    }
    table
}

/// Index of the first segment whose end is at least `value`, or 8.
fn search(value: i32, table: &[i32; 8]) -> u8 {
    table
        .iter()
        .position(|&end| value <= end)
        .map_or(8, |seg| seg as u8)
}

const fn alaw_expand(byte: u8) -> i16 {
    let value = byte ^ 0x55;
    let mut t = ((value & QUANT_MASK) as i32) << 4;
    let seg = (value & SEG_MASK) >> SEG_SHIFT;
    match seg {
        0 => t += 8,
        1 => t += 0x108,
        _ => {
            t += 0x108;
            t <<= seg - 1;
        }
    }
    if value & SIGN_BIT == 0 { -t as i16 } else { t as i16 }
}

const fn mulaw_expand(byte: u8) -> i16 {
    let value = !byte;
    let mut t = (((value & QUANT_MASK) as i32) << 3) + MULAW_BIAS;
    t <<= (value & SEG_MASK) >> SEG_SHIFT;
    if value & SIGN_BIT == 0 {
        (t - MULAW_BIAS) as i16
    } else {
        (MULAW_BIAS - t) as i16
    }
}

/// Expands an A-law byte to 16-bit linear PCM.
#[must_use]
pub fn alaw_to_linear(byte: u8) -> i16 {
    ALAW_DECODE[usize::from(byte)]
}

/// Expands a mu-law byte to 16-bit linear PCM.
#[must_use]
pub fn mulaw_to_linear(byte: u8) -> i16 {
    MULAW_DECODE[usize::from(byte)]
}

/// Compresses 16-bit linear PCM to A-law.
#[must_use]
pub fn linear_to_alaw(pcm: i16) -> u8 {
    let mut value = i32::from(pcm) >> 3;
    let mask = if value >= 0 {
        0xD5
    } else {
        value = -value - 1;
        0x55
    };
    value = value.min(ALAW_CLIP);

    let seg = search(value, &ALAW_SEG_END);
    if seg >= 8 {
        return 0x7F ^ mask;
    }

    let quant = if seg < 2 { value >> 1 } else { value >> seg };
    ((seg << SEG_SHIFT) | (quant as u8 & QUANT_MASK)) ^ mask
}

/// Compresses 16-bit linear PCM to mu-law.
#[must_use]
pub fn linear_to_mulaw(pcm: i16) -> u8 {
    let mut value = i32::from(pcm) >> 2;
    let mask = if value < 0 {
        value = -value;
        0x7F
    } else {
        0xFF
    };
    value = value.min(MULAW_CLIP) + (MULAW_BIAS >> 2);

    let seg = search(value, &MULAW_SEG_END);
    if seg >= 8 {
        return 0x7F ^ mask;
    }

    ((seg << SEG_SHIFT) | ((value >> (seg + 1)) as u8 & QUANT_MASK)) ^ mask
}
