//! The `fmt ` chunk and WAVE format tags.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, Result};

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const WAVE_FORMAT_ALAW: u16 = 0x0006;
pub const WAVE_FORMAT_MULAW: u16 = 0x0007;
pub const WAVE_FORMAT_DSP_TRUESPEECH: u16 = 0x0022;
pub const WAVE_FORMAT_GSM610: u16 = 0x0031;
pub const WAVE_FORMAT_VOXWARE_RT29: u16 = 0x181C;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Size of the fixed `fmt ` fields.
pub const FMT_BASE_SIZE: usize = 16;
/// Minimum extension size that carries an extensible descriptor.
pub const FMT_EXTENSIBLE_SIZE: usize = 22;

const SUB_FORMAT_TAIL: [u8; 12] = [
    0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Builds the `KSDATAFORMAT_SUBTYPE_*` GUID for a format tag.
#[must_use]
pub fn sub_format_guid(format_tag: u16) -> [u8; 16] {
    let mut guid = [0u8; 16];
    guid[..4].copy_from_slice(&u32::from(format_tag).to_le_bytes());
    guid[4..].copy_from_slice(&SUB_FORMAT_TAIL);
    guid
}

/// Human readable name of a format tag.
#[must_use]
pub const fn format_name(format_tag: u16) -> &'static str {
    match format_tag {
        WAVE_FORMAT_PCM => "PCM",
        WAVE_FORMAT_IEEE_FLOAT => "IEEE float",
        WAVE_FORMAT_ALAW => "A-law",
        WAVE_FORMAT_MULAW => "mu-law",
        WAVE_FORMAT_DSP_TRUESPEECH => "DSP Group TrueSpeech",
        WAVE_FORMAT_GSM610 => "GSM 6.10",
        WAVE_FORMAT_VOXWARE_RT29 => "Voxware RT29",
        WAVE_FORMAT_EXTENSIBLE => "extensible",
        _ => "unknown",
    }
}

/// The `WAVE_FORMAT_EXTENSIBLE` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmtExtensible {
    pub valid_bits_per_sample: u16,
    pub channel_mask: u32,
    pub sub_format: [u8; 16],
    /// Bytes following the 22-byte descriptor
    pub extra: Bytes,
}

impl FmtExtensible {
    #[must_use]
    pub fn new(valid_bits_per_sample: u16, sub_format_tag: u16) -> Self {
        Self {
            valid_bits_per_sample,
            channel_mask: 0,
            sub_format: sub_format_guid(sub_format_tag),
            extra: Bytes::new(),
        }
    }

    /// Format tag encoded in the first two bytes of the sub-format GUID.
    #[must_use]
    pub const fn sub_format_tag(&self) -> u16 {
        u16::from_le_bytes([self.sub_format[0], self.sub_format[1]])
    }
}

/// Parsed `fmt ` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmtChunk {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Extension bytes following the base fields, as read from the stream
    pub extra_data: Bytes,
    pub extensible: Option<FmtExtensible>,
}

impl FmtChunk {
    /// Derives block align and byte rate from the sample layout.
    #[must_use]
    pub fn new(format_tag: u16, channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        let mut fmt = Self {
            format_tag,
            channels,
            sample_rate,
            avg_bytes_per_sec: 0,
            block_align: 0,
            bits_per_sample,
            extra_data: Bytes::new(),
            extensible: None,
        };
        fmt.derive_rates();
        fmt
    }

    /// Recomputes `block_align` and `avg_bytes_per_sec` from the other fields.
    pub fn derive_rates(&mut self) {
        #[allow(clippy::cast_possible_truncation)]
        let block_align =
            (u32::from(self.channels) * bytes_per_sample(self.bits_per_sample) as u32) as u16;
        self.block_align = block_align;
        self.avg_bytes_per_sec = self.sample_rate.saturating_mul(u32::from(block_align));
    }

    /// Parses a `fmt ` payload.
    ///
    /// # Errors
    ///
    /// * If the payload is shorter than the 16 base bytes
    /// * If the declared extension size exceeds the payload
    /// * If an extensible tag carries a descriptor shorter than 22 bytes
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let size = payload.len();
        if size < FMT_BASE_SIZE {
            return Err(Error::InvalidFormatChunk {
                size,
                message: format!("need at least {FMT_BASE_SIZE} bytes"),
            });
        }

        let mut buf = payload;
        let mut fmt = Self {
            format_tag: buf.get_u16_le(),
            channels: buf.get_u16_le(),
            sample_rate: buf.get_u32_le(),
            avg_bytes_per_sec: buf.get_u32_le(),
            block_align: buf.get_u16_le(),
            bits_per_sample: buf.get_u16_le(),
            extra_data: Bytes::new(),
            extensible: None,
        };

        if buf.remaining() < 2 {
            if buf.has_remaining() {
                log::warn!("fmt chunk has {} stray trailing byte(s)", buf.remaining());
            }
            return Ok(fmt);
        }

        let ext_size = usize::from(buf.get_u16_le());
        if ext_size > buf.remaining() {
            return Err(Error::InvalidFormatChunk {
                size,
                message: format!(
                    "extension declares {ext_size} bytes but only {} remain",
                    buf.remaining()
                ),
            });
        }
        fmt.extra_data = Bytes::copy_from_slice(&buf[..ext_size]);

        if fmt.format_tag == WAVE_FORMAT_EXTENSIBLE {
            if ext_size < FMT_EXTENSIBLE_SIZE {
                log::warn!(
                    "extensible fmt chunk carries {ext_size} extension byte(s), \
                     {FMT_EXTENSIBLE_SIZE} needed for a descriptor"
                );
                return Ok(fmt);
            }

            let mut ext = &buf[..ext_size];
            let valid_bits_per_sample = ext.get_u16_le();
            let channel_mask = ext.get_u32_le();
            let mut sub_format = [0u8; 16];
            ext.copy_to_slice(&mut sub_format);

            fmt.extensible = Some(FmtExtensible {
                valid_bits_per_sample,
                channel_mask,
                sub_format,
                extra: Bytes::copy_from_slice(ext),
            });
        }

        Ok(fmt)
    }

    /// The tag that governs sample coding, resolved through the extensible
    /// sub-format when present.
    #[must_use]
    pub fn effective_format_tag(&self) -> u16 {
        match &self.extensible {
            Some(ext) if self.format_tag == WAVE_FORMAT_EXTENSIBLE => ext.sub_format_tag(),
            _ => self.format_tag,
        }
    }

    /// Valid bits per sample, falling back to the container bit depth.
    #[must_use]
    pub fn sample_bit_depth(&self) -> u16 {
        match &self.extensible {
            Some(ext) if ext.valid_bits_per_sample > 0 => ext.valid_bits_per_sample,
            _ => self.bits_per_sample,
        }
    }

    /// Whether the extensible descriptor is written on encode.
    #[must_use]
    pub const fn writes_extensible(&self) -> bool {
        self.format_tag == WAVE_FORMAT_EXTENSIBLE && self.extensible.is_some()
    }

    /// Serializes the payload written to the stream.
    ///
    /// Plain formats write the 16 base bytes; extensible formats add the
    /// extension size and descriptor.
    #[must_use]
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FMT_BASE_SIZE + 2 + FMT_EXTENSIBLE_SIZE);
        buf.put_u16_le(self.format_tag);
        buf.put_u16_le(self.channels);
        buf.put_u32_le(self.sample_rate);
        buf.put_u32_le(self.avg_bytes_per_sec);
        buf.put_u16_le(self.block_align);
        buf.put_u16_le(self.bits_per_sample);

        if let Some(ext) = self.extensible.as_ref().filter(|_| self.writes_extensible()) {
            #[allow(clippy::cast_possible_truncation)]
            let ext_size = (FMT_EXTENSIBLE_SIZE + ext.extra.len()).min(usize::from(u16::MAX)) as u16;
            buf.put_u16_le(ext_size);
            buf.put_u16_le(ext.valid_bits_per_sample);
            buf.put_u32_le(ext.channel_mask);
            buf.put_slice(&ext.sub_format);
            buf.put_slice(&ext.extra[..usize::from(ext_size) - FMT_EXTENSIBLE_SIZE]);
        }

        buf.freeze()
    }
}

impl fmt::Display for FmtChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.effective_format_tag();
        write!(
            f,
            "{} ({tag:#06x}), {} channel(s) @ {} Hz, {} bits",
            format_name(tag),
            self.channels,
            self.sample_rate,
            self.bits_per_sample,
        )
    }
}

/// Bytes occupied by one sample of the given declared bit depth.
#[must_use]
pub const fn bytes_per_sample(bits_per_sample: u16) -> usize {
    if bits_per_sample == 0 {
        return 0;
    }
    (bits_per_sample as usize - 1) / 8 + 1
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn pcm_payload() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&44_100u32.to_le_bytes());
        payload.extend_from_slice(&176_400u32.to_le_bytes());
        payload.extend_from_slice(&4u16.to_le_bytes());
        payload.extend_from_slice(&16u16.to_le_bytes());
        payload
    }

    #[test_log::test]
    fn test_parse_plain_pcm() {
        let fmt = FmtChunk::parse(&pcm_payload()).unwrap();

        assert_eq!(fmt, FmtChunk::new(WAVE_FORMAT_PCM, 2, 44_100, 16));
        assert_eq!(fmt.effective_format_tag(), WAVE_FORMAT_PCM);
        assert_eq!(fmt.to_payload().as_ref(), pcm_payload().as_slice());
    }

    #[test_log::test]
    fn test_parse_keeps_plain_extension_bytes() {
        let mut payload = pcm_payload();
        payload[0] = 0x31;
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&320u16.to_le_bytes());

        let fmt = FmtChunk::parse(&payload).unwrap();
        assert_eq!(fmt.format_tag, WAVE_FORMAT_GSM610);
        assert_eq!(fmt.extra_data.as_ref(), &320u16.to_le_bytes());
        assert_eq!(fmt.extensible, None);
    }

    #[test_log::test]
    fn test_parse_extensible() {
        let mut payload = pcm_payload();
        payload[..2].copy_from_slice(&WAVE_FORMAT_EXTENSIBLE.to_le_bytes());
        payload.extend_from_slice(&24u16.to_le_bytes());
        payload.extend_from_slice(&12u16.to_le_bytes());
        payload.extend_from_slice(&3u32.to_le_bytes());
        payload.extend_from_slice(&sub_format_guid(WAVE_FORMAT_IEEE_FLOAT));
        payload.extend_from_slice(&[0xAB, 0xCD]);

        let fmt = FmtChunk::parse(&payload).unwrap();
        let ext = fmt.extensible.clone().unwrap();

        assert_eq!(ext.valid_bits_per_sample, 12);
        assert_eq!(ext.channel_mask, 3);
        assert_eq!(ext.extra.as_ref(), &[0xAB, 0xCD]);
        assert_eq!(fmt.effective_format_tag(), WAVE_FORMAT_IEEE_FLOAT);
        assert_eq!(fmt.sample_bit_depth(), 12);
        assert_eq!(fmt.to_payload().as_ref(), payload.as_slice());
    }

    #[test_log::test]
    fn test_parse_extensible_without_descriptor_keeps_base_tag() {
        let mut payload = pcm_payload();
        payload[..2].copy_from_slice(&WAVE_FORMAT_EXTENSIBLE.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());

        let fmt = FmtChunk::parse(&payload).unwrap();

        assert_eq!(fmt.format_tag, WAVE_FORMAT_EXTENSIBLE);
        assert_eq!(fmt.extensible, None);
        assert_eq!(fmt.effective_format_tag(), WAVE_FORMAT_EXTENSIBLE);
        assert_eq!(fmt.sample_bit_depth(), 16);
    }

    #[test_log::test]
    fn test_parse_rejects_short_payload() {
        let err = FmtChunk::parse(&[0u8; 14]).unwrap_err();
        assert!(matches!(err, Error::InvalidFormatChunk { size: 14, .. }));
    }

    #[test_log::test]
    fn test_parse_rejects_overlong_extension() {
        let mut payload = pcm_payload();
        payload.extend_from_slice(&10u16.to_le_bytes());
        payload.extend_from_slice(&[0; 4]);

        let err = FmtChunk::parse(&payload).unwrap_err();
        assert!(matches!(err, Error::InvalidFormatChunk { size: 22, .. }));
    }

    #[test_log::test]
    fn test_sub_format_guid_layout() {
        assert_eq!(
            sub_format_guid(WAVE_FORMAT_PCM),
            [
                0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00,
                0x38, 0x9B, 0x71
            ]
        );
        assert_eq!(
            FmtExtensible::new(24, WAVE_FORMAT_MULAW).sub_format_tag(),
            WAVE_FORMAT_MULAW
        );
    }

    #[test_case(8, 1)]
    #[test_case(12, 2)]
    #[test_case(16, 2)]
    #[test_case(20, 3)]
    #[test_case(24, 3)]
    #[test_case(32, 4)]
    #[test_case(64, 8)]
    #[test_case(0, 0)]
    fn test_bytes_per_sample(bits: u16, expected: usize) {
        assert_eq!(bytes_per_sample(bits), expected);
    }

    #[test_log::test]
    fn test_display() {
        let fmt = FmtChunk::new(WAVE_FORMAT_PCM, 1, 22_050, 16);
        assert_eq!(fmt.to_string(), "PCM (0x0001), 1 channel(s) @ 22050 Hz, 16 bits");
    }
}
