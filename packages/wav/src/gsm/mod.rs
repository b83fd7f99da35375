//! GSM 06.10 full-rate speech decoder for WAV49 (format tag 49) streams.
//!
//! A WAV49 block is 65 bytes holding two 160-sample frames. The decoder keeps
//! filter memory across blocks, so blocks must be fed in stream order. To
//! restart from the beginning of a stream, create a new [`GsmDecoder`].

use std::io::Read;

use crate::{Result, chunk::read_full, codec::pcm::i16_to_float};

pub mod constants;
pub mod frame;
mod synthesis;

pub use frame::{GsmFrame, GsmSubframe, unpack_block};

use constants::FRAME_LEN;
use synthesis::SynthesisState;

/// Bytes in one WAV49 block.
pub const BLOCK_SIZE: usize = 65;
/// Samples decoded from one WAV49 block.
pub const SAMPLES_PER_BLOCK: usize = 2 * FRAME_LEN;

/// Stateful WAV49 decoder.
///
/// Besides the synthesis filter memory it buffers decoded samples the caller
/// has not consumed yet, and stops after the declared sample count when one
/// is set.
#[derive(Debug, Clone, Default)]
pub struct GsmDecoder {
    state: SynthesisState,
    leftover: Vec<f32>,
    leftover_pos: usize,
    delivered: u64,
    /// Declared sample count from the `fact` chunk; 0 means unbounded
    cap: u64,
}

impl GsmDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder that stops after `declared_samples` samples.
    ///
    /// A count of zero disables the cap.
    #[must_use]
    pub fn with_sample_cap(declared_samples: u32) -> Self {
        Self {
            cap: u64::from(declared_samples),
            ..Self::default()
        }
    }

    /// Samples handed out so far.
    #[must_use]
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Decoded samples waiting to be handed out.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.leftover.len() - self.leftover_pos
    }

    /// Whether decoded samples are still waiting to be handed out.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.buffered() > 0 && self.remaining_cap() != Some(0)
    }

    /// Decodes one 65-byte block into 320 signed samples.
    ///
    /// # Errors
    ///
    /// * If fewer than 65 bytes are given
    pub fn decode_block(&mut self, block: &[u8]) -> Result<[i16; SAMPLES_PER_BLOCK]> {
        let (first, second) = unpack_block(block)?;

        let mut out = [0i16; SAMPLES_PER_BLOCK];
        out[..FRAME_LEN].copy_from_slice(&self.state.decode_frame(&first));
        out[FRAME_LEN..].copy_from_slice(&self.state.decode_frame(&second));

        Ok(out)
    }

    /// Decodes every whole block `reader` yields.
    ///
    /// A trailing partial block ends decoding. The output is truncated to the
    /// declared sample count when that is smaller than the block-rounded
    /// total.
    ///
    /// # Errors
    ///
    /// * If the reader fails
    pub fn decode_all<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<Vec<f32>> {
        let mut samples = Vec::new();
        let mut block = [0u8; BLOCK_SIZE];

        loop {
            let read = read_full(reader, &mut block)?;
            if read < BLOCK_SIZE {
                if read > 0 {
                    log::debug!("GSM: ignoring {read} trailing byte(s) of a partial block");
                }
                break;
            }
            let decoded = self.decode_block(&block)?;
            samples.extend(decoded.iter().map(|&s| i16_to_float(s)));
        }

        if self.cap > 0 {
            let cap = usize::try_from(self.cap).unwrap_or(usize::MAX);
            if samples.len() > cap {
                log::debug!(
                    "GSM: truncating {} decoded samples to declared {cap}",
                    samples.len()
                );
                samples.truncate(cap);
            }
        }

        self.delivered += samples.len() as u64;
        Ok(samples)
    }

    /// Fills `out` with decoded samples, returning how many were written.
    ///
    /// Buffered samples from the previous call are served first. Returns 0
    /// once the stream or the declared sample count is exhausted.
    ///
    /// # Errors
    ///
    /// * If the reader fails
    pub fn decode_streaming<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        out: &mut [f32],
    ) -> Result<usize> {
        let mut filled = 0;
        let mut block = [0u8; BLOCK_SIZE];

        while filled < out.len() {
            let remaining_cap = self.remaining_cap();
            if remaining_cap == Some(0) {
                break;
            }

            let buffered = self.buffered();
            if buffered > 0 {
                let mut count = buffered.min(out.len() - filled);
                if let Some(remaining) = remaining_cap {
                    count = count.min(remaining);
                }

                out[filled..filled + count].copy_from_slice(
                    &self.leftover[self.leftover_pos..self.leftover_pos + count],
                );
                self.leftover_pos += count;
                self.delivered += count as u64;
                filled += count;
                continue;
            }

            if read_full(reader, &mut block)? < BLOCK_SIZE {
                break;
            }
            let decoded = self.decode_block(&block)?;
            self.leftover.clear();
            self.leftover.extend(decoded.iter().map(|&s| i16_to_float(s)));
            self.leftover_pos = 0;
        }

        Ok(filled)
    }

    fn remaining_cap(&self) -> Option<usize> {
        (self.cap > 0).then(|| {
            usize::try_from(self.cap.saturating_sub(self.delivered)).unwrap_or(usize::MAX)
        })
    }
}
