//! GSM 06.10 quantization tables (ETSI GSM 06.10, Section 4.2 and 5.2).

/// Long-term prediction gains indexed by the 2-bit gain code (Table 4.3b)
pub const QLB: [i16; 4] = [3277, 11469, 21299, 32767];

/// Normalized inverse mantissa used by the APCM inverse quantizer (Table 4.5)
pub const FAC: [i16; 8] = [18431, 20479, 22527, 24575, 26623, 28671, 30719, 32767];

/// LAR decoding offsets: minimum code value per coefficient (Table 4.1)
pub const MIC: [i16; 8] = [-32, -32, -16, -16, -8, -8, -4, -4];

/// LAR decoding additive terms (Table 4.1)
pub const B: [i16; 8] = [0, 0, 2048, -2560, 94, -1792, -341, -1144];

/// LAR decoding inverse scale factors (Table 4.2)
pub const INVA: [i16; 8] = [13107, 13107, 13107, 13107, 19223, 17476, 31454, 29708];

/// Bit widths of the eight LAR codes
pub const LAR_BITS: [u32; 8] = [6, 6, 5, 5, 4, 4, 3, 3];

/// De-emphasis filter coefficient
pub const DEEMPHASIS: i16 = 28180;

/// Pitch lag substituted before the first valid lag is seen
pub const INITIAL_PITCH_LAG: i16 = 40;

pub const MIN_PITCH_LAG: i16 = 40;
pub const MAX_PITCH_LAG: i16 = 120;

/// Residual pulses per subframe
pub const RPE_PULSES: usize = 13;

pub const SUBFRAME_LEN: usize = 40;
pub const SUBFRAMES: usize = 4;
pub const FRAME_LEN: usize = SUBFRAME_LEN * SUBFRAMES;

/// Interpolation segment bounds within a frame: 0..13, 13..27, 27..40, 40..160
pub const SEGMENT_ENDS: [usize; 4] = [13, 27, 40, FRAME_LEN];
