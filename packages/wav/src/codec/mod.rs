//! Sample codec table.
//!
//! Resolves a `(bits_per_sample, effective format tag)` pair to the exact
//! conversion between stored sample bytes and normalized `f32` samples.

use bytes::BufMut;

use crate::{
    Error, Result,
    format::{
        FmtChunk, WAVE_FORMAT_ALAW, WAVE_FORMAT_DSP_TRUESPEECH, WAVE_FORMAT_GSM610,
        WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_MULAW, WAVE_FORMAT_PCM, WAVE_FORMAT_VOXWARE_RT29,
        format_name,
    },
};

pub mod g711;
pub mod pcm;

/// Codecs that map each stored sample independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearCodec {
    PcmU8,
    PcmI16,
    PcmI24,
    PcmI32,
    Float32,
    Float64,
    ALaw,
    MuLaw,
}

impl LinearCodec {
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::PcmU8 | Self::ALaw | Self::MuLaw => 1,
            Self::PcmI16 => 2,
            Self::PcmI24 => 3,
            Self::PcmI32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Decodes one sample from the front of `bytes`.
    ///
    /// `bytes` must hold at least [`Self::bytes_per_sample`] bytes.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            Self::PcmU8 => pcm::u8_to_float(bytes[0]),
            Self::PcmI16 => pcm::i16_to_float(i16::from_le_bytes([bytes[0], bytes[1]])),
            Self::PcmI24 => pcm::int_to_float(pcm::i24_from_le([bytes[0], bytes[1], bytes[2]]), 24),
            Self::PcmI32 => pcm::int_to_float(
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                32,
            ),
            Self::Float32 => pcm::clamp_f32(f32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ])),
            Self::Float64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                pcm::clamp_f64(f64::from_le_bytes(raw)) as f32
            }
            Self::ALaw => pcm::i16_to_float(g711::alaw_to_linear(bytes[0])),
            Self::MuLaw => pcm::i16_to_float(g711::mulaw_to_linear(bytes[0])),
        }
    }

    /// Decodes whole samples from `bytes` into `out`, returning the count.
    ///
    /// Trailing bytes that do not form a whole sample are ignored.
    pub fn decode_slice(self, bytes: &[u8], out: &mut [f32]) -> usize {
        let mut count = 0;
        for (sample, raw) in out
            .iter_mut()
            .zip(bytes.chunks_exact(self.bytes_per_sample()))
        {
            *sample = self.decode(raw);
            count += 1;
        }
        count
    }

    /// Encodes one normalized sample.
    pub fn encode(self, value: f32, out: &mut impl BufMut) {
        match self {
            Self::Float64 => out.put_f64_le(pcm::clamp_f64(f64::from(value))),
            _ => self.encode_f64(f64::from(value), out),
        }
    }

    /// Encodes one normalized 64-bit sample, keeping full precision for
    /// 64-bit float storage.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode_f64(self, value: f64, out: &mut impl BufMut) {
        match self {
            Self::PcmU8 => out.put_u8(pcm::float_to_u8(value as f32)),
            Self::PcmI16 => out.put_i16_le(pcm::float_to_i16(value)),
            Self::PcmI24 => out.put_slice(&pcm::i24_to_le(pcm::float_to_int(value, 24))),
            Self::PcmI32 => out.put_i32_le(pcm::float_to_int(value, 32)),
            Self::Float32 => out.put_f32_le(pcm::clamp_f32(value as f32)),
            Self::Float64 => out.put_f64_le(pcm::clamp_f64(value)),
            Self::ALaw => out.put_u8(g711::linear_to_alaw(pcm::float_to_i16(value))),
            Self::MuLaw => out.put_u8(g711::linear_to_mulaw(pcm::float_to_i16(value))),
        }
    }
}

/// The codec selected for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleCodec {
    Linear(LinearCodec),
    /// WAV49 blocks, decoded by [`crate::gsm::GsmDecoder`]
    #[cfg(feature = "gsm")]
    Gsm610,
}

impl SampleCodec {
    /// Selects the codec for a declared bit depth and effective format tag.
    ///
    /// # Errors
    ///
    /// * If the format is a known compressed format with no decoder
    /// * If the bit depth is not valid for the format
    /// * If the format tag is unknown
    pub fn resolve(bits_per_sample: u16, format_tag: u16) -> Result<Self> {
        let unsupported_depth = || Error::UnsupportedBitDepth {
            format: format_name(format_tag),
            tag: format_tag,
            bits: bits_per_sample,
        };

        let codec = match format_tag {
            WAVE_FORMAT_PCM => match bits_per_sample {
                1..=8 => LinearCodec::PcmU8,
                9..=16 => LinearCodec::PcmI16,
                17..=24 => LinearCodec::PcmI24,
                25..=32 => LinearCodec::PcmI32,
                _ => return Err(unsupported_depth()),
            },
            WAVE_FORMAT_IEEE_FLOAT => match bits_per_sample {
                32 => LinearCodec::Float32,
                64 => LinearCodec::Float64,
                _ => return Err(unsupported_depth()),
            },
            WAVE_FORMAT_ALAW if bits_per_sample == 8 => LinearCodec::ALaw,
            WAVE_FORMAT_MULAW if bits_per_sample == 8 => LinearCodec::MuLaw,
            WAVE_FORMAT_ALAW | WAVE_FORMAT_MULAW => return Err(unsupported_depth()),
            #[cfg(feature = "gsm")]
            WAVE_FORMAT_GSM610 => return Ok(Self::Gsm610),
            #[cfg(not(feature = "gsm"))]
            WAVE_FORMAT_GSM610 => {
                return Err(Error::UnsupportedCompressedFormat {
                    name: format_name(format_tag),
                    tag: format_tag,
                });
            }
            WAVE_FORMAT_DSP_TRUESPEECH | WAVE_FORMAT_VOXWARE_RT29 => {
                return Err(Error::UnsupportedCompressedFormat {
                    name: format_name(format_tag),
                    tag: format_tag,
                });
            }
            _ => return Err(Error::UnsupportedFormat(format_tag)),
        };

        Ok(Self::Linear(codec))
    }

    /// Selects the codec for a parsed `fmt ` chunk.
    ///
    /// # Errors
    ///
    /// * See [`Self::resolve`]
    pub fn for_format(fmt: &FmtChunk) -> Result<Self> {
        Self::resolve(fmt.bits_per_sample, fmt.effective_format_tag())
    }

    /// The per-sample codec used for writing.
    ///
    /// # Errors
    ///
    /// * If the codec can only be decoded
    pub const fn encoder(self) -> Result<LinearCodec> {
        match self {
            Self::Linear(codec) => Ok(codec),
            #[cfg(feature = "gsm")]
            Self::Gsm610 => Err(Error::EncodeUnsupported {
                name: format_name(WAVE_FORMAT_GSM610),
                tag: WAVE_FORMAT_GSM610,
            }),
        }
    }
}
