use crate::{Error, Result};

use super::{
    BLOCK_SIZE,
    constants::{LAR_BITS, RPE_PULSES, SUBFRAMES},
};

/// One 20 ms GSM 06.10 speech frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsmFrame {
    /// Log-area-ratio codes
    pub larc: [i16; 8],
    pub subframes: [GsmSubframe; SUBFRAMES],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsmSubframe {
    /// Pitch lag, 7 bits
    pub nc: i16,
    /// LTP gain index, 2 bits
    pub bc: i16,
    /// RPE grid position, 2 bits
    pub mc: i16,
    /// Block amplitude, 6 bits
    pub xmaxc: i16,
    /// Residual pulses, 3 bits each
    pub xmc: [i16; RPE_PULSES],
}

/// LSB-first bit reader with a carried shift register.
///
/// WAV49 packs both frames of a block back to back, so the second frame
/// starts in the upper nibble of byte 32.
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    register: u32,
    available: u32,
}

impl<'a> BitReader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            register: 0,
            available: 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read(&mut self, bits: u32) -> i16 {
        while self.available < bits {
            self.register |= u32::from(self.bytes[self.pos]) << self.available;
            self.pos += 1;
            self.available += 8;
        }
        let value = self.register & ((1 << bits) - 1);
        self.register >>= bits;
        self.available -= bits;
        value as i16
    }

    fn frame(&mut self) -> GsmFrame {
        let mut frame = GsmFrame::default();

        for (larc, &bits) in frame.larc.iter_mut().zip(LAR_BITS.iter()) {
            *larc = self.read(bits);
        }

        for sub in &mut frame.subframes {
            sub.nc = self.read(7);
            sub.bc = self.read(2);
            sub.mc = self.read(2);
            sub.xmaxc = self.read(6);
            for xmc in &mut sub.xmc {
                *xmc = self.read(3);
            }
        }

        frame
    }
}

/// Splits a 65-byte WAV49 block into its two frames.
///
/// # Errors
///
/// * If fewer than 65 bytes are given
pub fn unpack_block(block: &[u8]) -> Result<(GsmFrame, GsmFrame)> {
    if block.len() < BLOCK_SIZE {
        return Err(Error::GsmBlockTooShort(block.len()));
    }

    let mut reader = BitReader::new(&block[..BLOCK_SIZE]);
    let first = reader.frame();
    let second = reader.frame();
    log::trace!(
        "unpacked GSM block: lags {:?} / {:?}",
        first.subframes.map(|s| s.nc),
        second.subframes.map(|s| s.nc)
    );

    Ok((first, second))
}
