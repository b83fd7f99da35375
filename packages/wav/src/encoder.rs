//! RIFF/WAVE container encoder.
//!
//! The header and `data` chunk are written lazily on the first sample with
//! placeholder sizes, which [`WavEncoder::close`] patches once the final
//! lengths are known. The writer must therefore be seekable.

use std::io::{Read, Seek, SeekFrom, Write};

use bytes::BytesMut;

use crate::{
    Error, Result,
    chunk::{ChunkId, RawChunk, pad_len},
    codec::{LinearCodec, SampleCodec},
    decoder::WavDecoder,
    format::{
        FmtChunk, FmtExtensible, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_PCM,
    },
    registry::{ChunkRegistry, Metadata},
};

/// Stream parameters for a [`WavEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub format_tag: u16,
}

impl EncoderConfig {
    #[must_use]
    pub const fn new(sample_rate: u32, bits_per_sample: u16, channels: u16, format_tag: u16) -> Self {
        Self {
            sample_rate,
            bits_per_sample,
            channels,
            format_tag,
        }
    }
}

/// A single sample for [`WavEncoder::write_frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameValue {
    F32(f32),
    F64(f64),
}

impl From<f32> for FrameValue {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<f64> for FrameValue {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

/// Encoder for RIFF/WAVE streams.
pub struct WavEncoder<W> {
    writer: W,
    config: EncoderConfig,
    fmt: Option<FmtChunk>,
    raw_chunks: Vec<RawChunk>,
    metadata: Metadata,
    registry: ChunkRegistry,
    buffer: BytesMut,
    /// Set once the header is written
    codec: Option<LinearCodec>,
    /// Stream position of the `RIFF` tag
    base: u64,
    riff_size_pos: u64,
    data_size_pos: u64,
    samples_written: u64,
    data_started: bool,
    /// Pad byte, trailing chunks and hook chunks are on the wire
    trailer_written: bool,
    closed: bool,
}

impl<W> std::fmt::Debug for WavEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavEncoder")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .field("samples_written", &self.samples_written)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Seek> WavEncoder<W> {
    /// Wraps `writer`. Nothing is written until the first sample or
    /// [`Self::close`].
    pub fn new(writer: W, config: EncoderConfig) -> Self {
        Self {
            writer,
            config,
            fmt: None,
            raw_chunks: Vec::new(),
            metadata: Metadata::new(),
            registry: ChunkRegistry::default(),
            buffer: BytesMut::new(),
            codec: None,
            base: 0,
            riff_size_pos: 0,
            data_size_pos: 0,
            samples_written: 0,
            data_started: false,
            trailer_written: false,
            closed: false,
        }
    }

    /// Builds an encoder matching a decoder's stream parameters.
    ///
    /// Copies its `fmt ` chunk, preserved chunks and registry. Metadata is
    /// not copied; hand it over with [`Self::set_metadata`].
    pub fn from_decoder<R: Read + Seek>(writer: W, decoder: &WavDecoder<R>) -> Self {
        let config = EncoderConfig::new(
            decoder.sample_rate(),
            decoder.bits_per_sample(),
            decoder.channels(),
            decoder.format_tag(),
        );

        let mut encoder = Self::new(writer, config);
        encoder.fmt = decoder.format_chunk();
        encoder.raw_chunks = decoder.raw_chunks();
        encoder.registry = decoder.registry().clone();
        encoder
    }

    #[must_use]
    pub const fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Supplies the `fmt ` chunk to write.
    ///
    /// Sample rate, channel count, bit depth and the derived rates are still
    /// taken from the [`EncoderConfig`].
    pub fn set_format_chunk(&mut self, fmt: FmtChunk) {
        self.fmt = Some(fmt);
    }

    #[must_use]
    pub const fn format_chunk(&self) -> Option<&FmtChunk> {
        self.fmt.as_ref()
    }

    #[must_use]
    pub fn raw_chunks(&self) -> Vec<RawChunk> {
        self.raw_chunks.clone()
    }

    pub fn set_raw_chunks(&mut self, chunks: Vec<RawChunk>) {
        self.raw_chunks = chunks;
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    pub const fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn set_registry(&mut self, registry: ChunkRegistry) {
        self.registry = registry;
    }

    /// Samples written so far, across all channels.
    #[must_use]
    pub const fn samples_written(&self) -> u64 {
        self.samples_written
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Encodes and writes interleaved samples.
    ///
    /// # Errors
    ///
    /// * If the encoder is closed
    /// * If the configured format cannot be encoded
    /// * If the writer fails
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<()> {
        let codec = self.begin_write()?;

        self.buffer.clear();
        self.buffer.reserve(samples.len() * codec.bytes_per_sample());
        for &sample in samples {
            codec.encode(sample, &mut self.buffer);
        }

        self.writer.write_all(&self.buffer)?;
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    /// Encodes and writes one sample.
    ///
    /// # Errors
    ///
    /// * See [`Self::write_samples`]
    pub fn write_frame(&mut self, value: impl Into<FrameValue>) -> Result<()> {
        let codec = self.begin_write()?;

        self.buffer.clear();
        match value.into() {
            FrameValue::F32(v) => codec.encode(v, &mut self.buffer),
            FrameValue::F64(v) => codec.encode_f64(v, &mut self.buffer),
        }

        self.writer.write_all(&self.buffer)?;
        self.samples_written += 1;
        Ok(())
    }

    /// Finishes the file.
    ///
    /// Writes the header and an empty `data` chunk if no samples were
    /// written, then the pad byte, the preserved chunks that followed the
    /// audio, the chunks produced by registry encode hooks, and finally
    /// patches the RIFF and `data` sizes. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// * If the configured format cannot be encoded
    /// * If the file exceeds the 32-bit RIFF size limit
    /// * If the writer fails
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let codec = self.start_data()?;
        let data_len = self.samples_written * codec.bytes_per_sample() as u64;
        if !self.trailer_written {
            self.write_trailer(data_len)?;
        }

        let end = self.writer.stream_position()?;
        let riff_size = end - self.base - 8;
        let riff_size = u32::try_from(riff_size).map_err(|_| Error::ChunkTooLarge {
            id: ChunkId::RIFF,
            size: riff_size,
        })?;
        let data_size = u32::try_from(data_len).map_err(|_| Error::ChunkTooLarge {
            id: ChunkId::DATA,
            size: data_len,
        })?;

        self.writer.seek(SeekFrom::Start(self.riff_size_pos))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(self.data_size_pos))?;
        self.writer.write_all(&data_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        log::debug!(
            "closed encoder: {} samples, RIFF size {riff_size}, data size {data_size}",
            self.samples_written
        );
        self.closed = true;
        Ok(())
    }

    /// Closes the encoder and returns the writer.
    ///
    /// # Errors
    ///
    /// * See [`Self::close`]
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        Ok(self.writer)
    }

    fn begin_write(&mut self) -> Result<LinearCodec> {
        if self.closed || self.trailer_written {
            return Err(Error::EncoderClosed);
        }
        self.start_data()
    }

    fn write_trailer(&mut self, data_len: u64) -> Result<()> {
        if pad_len(data_len) > 0 {
            self.writer.write_all(&[0])?;
        }

        for chunk in self.raw_chunks.iter().filter(|c| !c.before_data) {
            write_chunk(&mut self.writer, chunk.id, &chunk.data)?;
        }

        for chunk in self.registry.encode(&self.metadata)? {
            log::debug!("writing {} chunk from encode hook", chunk.id);
            write_chunk(&mut self.writer, chunk.id, &chunk.data)?;
        }

        self.trailer_written = true;
        Ok(())
    }

    /// The `fmt ` chunk as it will be written.
    fn fmt_for_write(&self) -> FmtChunk {
        let config = &self.config;
        let mut fmt = self.fmt.clone().unwrap_or_else(|| {
            FmtChunk::new(
                config.format_tag,
                config.channels,
                config.sample_rate,
                config.bits_per_sample,
            )
        });
        fmt.channels = config.channels;
        fmt.sample_rate = config.sample_rate;
        fmt.bits_per_sample = config.bits_per_sample;

        if fmt.format_tag == WAVE_FORMAT_EXTENSIBLE || config.format_tag == WAVE_FORMAT_EXTENSIBLE {
            fmt.format_tag = WAVE_FORMAT_EXTENSIBLE;
            if fmt.extensible.is_none() {
                let sub_format = match config.format_tag {
                    WAVE_FORMAT_EXTENSIBLE if config.bits_per_sample == 64 => {
                        WAVE_FORMAT_IEEE_FLOAT
                    }
                    WAVE_FORMAT_EXTENSIBLE => WAVE_FORMAT_PCM,
                    tag => tag,
                };
                fmt.extensible = Some(FmtExtensible::new(config.bits_per_sample, sub_format));
            }
        } else {
            fmt.format_tag = config.format_tag;
            fmt.extensible = None;
        }

        fmt.derive_rates();
        fmt
    }

    fn write_header(&mut self) -> Result<LinearCodec> {
        if let Some(codec) = self.codec {
            return Ok(codec);
        }

        let fmt = self.fmt_for_write();
        let codec = SampleCodec::for_format(&fmt)?.encoder()?;

        self.base = self.writer.stream_position()?;
        self.riff_size_pos = self.base + 4;
        self.writer.write_all(ChunkId::RIFF.as_bytes())?;
        self.writer.write_all(&0u32.to_le_bytes())?;
        self.writer.write_all(ChunkId::WAVE.as_bytes())?;
        write_chunk(&mut self.writer, ChunkId::FMT, &fmt.to_payload())?;

        log::debug!("wrote header: {fmt}");
        self.codec = Some(codec);
        Ok(codec)
    }

    fn start_data(&mut self) -> Result<LinearCodec> {
        let codec = self.write_header()?;
        if self.data_started {
            return Ok(codec);
        }

        for chunk in self.raw_chunks.iter().filter(|c| c.before_data) {
            write_chunk(&mut self.writer, chunk.id, &chunk.data)?;
        }

        self.data_size_pos = self.writer.stream_position()? + 4;
        self.writer.write_all(ChunkId::DATA.as_bytes())?;
        self.writer.write_all(&0u32.to_le_bytes())?;
        self.data_started = true;
        Ok(codec)
    }
}

/// Writes a chunk header, payload and pad byte.
fn write_chunk<W: Write + ?Sized>(writer: &mut W, id: ChunkId, payload: &[u8]) -> Result<()> {
    let size = u32::try_from(payload.len()).map_err(|_| Error::ChunkTooLarge {
        id,
        size: payload.len() as u64,
    })?;

    log::trace!("writing {id} chunk ({size} bytes)");
    writer.write_all(id.as_bytes())?;
    writer.write_all(&size.to_le_bytes())?;
    writer.write_all(payload)?;
    if pad_len(u64::from(size)) > 0 {
        writer.write_all(&[0])?;
    }
    Ok(())
}
