//! RIFF/WAVE container decoder.
//!
//! [`WavDecoder`] walks the chunk list of a seekable stream, caches the
//! parsed `fmt ` chunk, routes auxiliary chunks through a [`ChunkRegistry`]
//! and decodes the `data` span to normalized `f32` samples, either in one
//! call or incrementally into a caller buffer.
//!
//! The first failure is sticky: every later call returns the same error
//! until [`WavDecoder::rewind`] clears it.

use std::{
    io::{Read, Seek, SeekFrom},
    time::Duration,
};

use bytes::Bytes;

use crate::{
    Error, Result,
    chunk::{ChunkHeader, ChunkId, ChunkKind, RawChunk, read_chunk_header, read_full},
    codec::{LinearCodec, SampleCodec},
    format::{
        FmtChunk, WAVE_FORMAT_DSP_TRUESPEECH, WAVE_FORMAT_GSM610, WAVE_FORMAT_VOXWARE_RT29,
    },
    registry::{ChunkRegistry, ChunkTag, FactChunk, Metadata},
};

#[cfg(feature = "gsm")]
use crate::gsm::GsmDecoder;

/// `RIFF` tag, container size and form type.
const RIFF_HEADER_SIZE: u64 = 12;

/// Samples decoded per batch by [`WavDecoder::decode_all`].
const DECODE_BATCH: usize = 4096;

/// Where a decoder is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    HeaderPending,
    HeaderRead,
    AudioLocated,
    Streaming,
    Exhausted,
}

/// Byte span of the `data` payload and how much of it has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DataSpan {
    start: u64,
    len: u64,
    consumed: u64,
}

impl DataSpan {
    fn new(header: &ChunkHeader) -> Self {
        Self {
            start: header.offset,
            len: u64::from(header.size),
            consumed: 0,
        }
    }

    const fn remaining(&self) -> u64 {
        self.len - self.consumed
    }
}

/// Bounded reader over the `data` span.
///
/// Seeks before every read so other chunk walks can share the stream.
struct SpanReader<'a, R> {
    inner: &'a mut R,
    span: &'a mut DataSpan,
}

impl<R: Read + Seek> Read for SpanReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.span.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        self.inner
            .seek(SeekFrom::Start(self.span.start + self.span.consumed))?;
        let read = self.inner.read(&mut buf[..want])?;
        self.span.consumed += read as u64;
        Ok(read)
    }
}

/// Decoder for RIFF/WAVE streams.
pub struct WavDecoder<R> {
    reader: R,
    registry: ChunkRegistry,
    fmt: Option<FmtChunk>,
    fmt_offset: u64,
    /// Offset of the next chunk header for the forward walk
    walk_pos: u64,
    data: Option<DataSpan>,
    metadata: Metadata,
    metadata_read: bool,
    raw_chunks: Vec<RawChunk>,
    #[cfg(feature = "gsm")]
    gsm: Option<GsmDecoder>,
    scratch: Vec<u8>,
    state: DecoderState,
    pcm_accessed: bool,
    err: Option<Error>,
}

impl<R> std::fmt::Debug for WavDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavDecoder")
            .field("fmt", &self.fmt)
            .field("data", &self.data)
            .field("state", &self.state)
            .field("raw_chunks", &self.raw_chunks.len())
            .field("err", &self.err)
            .finish_non_exhaustive()
    }
}

impl<R: Read + Seek> WavDecoder<R> {
    /// Wraps `reader` with the default registry. No I/O happens until a
    /// header or sample operation is called.
    pub fn new(reader: R) -> Self {
        Self::with_registry(reader, ChunkRegistry::default())
    }

    pub fn with_registry(reader: R, registry: ChunkRegistry) -> Self {
        Self {
            reader,
            registry,
            fmt: None,
            fmt_offset: 0,
            walk_pos: RIFF_HEADER_SIZE,
            data: None,
            metadata: Metadata::new(),
            metadata_read: false,
            raw_chunks: Vec::new(),
            #[cfg(feature = "gsm")]
            gsm: None,
            scratch: Vec::new(),
            state: DecoderState::HeaderPending,
            pcm_accessed: false,
            err: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    #[must_use]
    pub const fn state(&self) -> DecoderState {
        self.state
    }

    /// The first error this decoder hit, if any.
    #[must_use]
    pub const fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    #[must_use]
    pub const fn registry(&self) -> &ChunkRegistry {
        &self.registry
    }

    /// Validates the RIFF header and parses the `fmt ` chunk.
    ///
    /// Chunks ahead of `fmt ` are offered to the registry on the way. Does
    /// nothing once the format is known.
    ///
    /// # Errors
    ///
    /// * If the stream is not a RIFF/WAVE container
    /// * If no valid `fmt ` chunk precedes the end of the stream
    /// * If a chunk handler fails
    /// * If an earlier operation failed
    pub fn read_header(&mut self) -> Result<()> {
        self.check()?;
        let result = self.parse_header();
        self.record(result)
    }

    /// Walks the chunk list up to the `data` chunk.
    ///
    /// Chunks passed on the way are offered to the registry.
    ///
    /// # Errors
    ///
    /// * If the header is invalid
    /// * If the stream ends before a `data` chunk
    /// * If a chunk handler fails
    pub fn forward_to_audio_data(&mut self) -> Result<()> {
        self.check()?;
        let result = self.locate_audio_data();
        self.record(result)
    }

    /// Walks every chunk, routing them through the registry and preserving
    /// the unclaimed ones as [`RawChunk`]s.
    ///
    /// Does nothing after the first successful call.
    ///
    /// # Errors
    ///
    /// * If the header is invalid
    /// * If a chunk header is truncated
    /// * If a chunk handler fails
    pub fn read_metadata(&mut self) -> Result<()> {
        self.check()?;
        if self.metadata_read {
            return Ok(());
        }
        let result = self.collect_metadata();
        self.record(result)
    }

    /// Decodes the remaining audio data in one call.
    ///
    /// # Errors
    ///
    /// * If the audio data cannot be located
    /// * If the format has no decoder
    /// * If the stream fails
    pub fn decode_all(&mut self) -> Result<Vec<f32>> {
        self.check()?;
        let result = self.decode_remaining();
        self.record(result)
    }

    /// Fills `out` with the next samples, returning how many were written.
    ///
    /// Returns `Ok(0)` once the audio data is exhausted. A partial trailing
    /// sample is dropped.
    ///
    /// # Errors
    ///
    /// * If the audio data cannot be located
    /// * If the format has no decoder
    /// * If the stream fails
    pub fn decode_into(&mut self, out: &mut [f32]) -> Result<usize> {
        self.check()?;
        let result = self.decode_batch(out);
        self.record(result)
    }

    /// Restarts decoding from the beginning of the stream.
    ///
    /// Clears the cached format, the audio cursor, codec state and the sticky
    /// error, then walks forward to the audio data again. Metadata, preserved
    /// chunks and the registry are kept.
    ///
    /// # Errors
    ///
    /// * See [`Self::forward_to_audio_data`]
    pub fn rewind(&mut self) -> Result<()> {
        log::debug!("rewinding decoder");
        self.fmt = None;
        self.data = None;
        #[cfg(feature = "gsm")]
        {
            self.gsm = None;
        }
        self.err = None;
        self.walk_pos = RIFF_HEADER_SIZE;
        self.state = DecoderState::HeaderPending;
        self.pcm_accessed = false;

        let result = self.locate_audio_data();
        self.record(result)
    }

    /// Whether the stream looks like a playable WAV file.
    pub fn is_valid_file(&mut self) -> bool {
        if self.read_header().is_err() {
            return false;
        }
        let Some(fmt) = &self.fmt else {
            return false;
        };
        if fmt.channels < 1 {
            return false;
        }

        let compressed = matches!(
            fmt.effective_format_tag(),
            WAVE_FORMAT_GSM610 | WAVE_FORMAT_DSP_TRUESPEECH | WAVE_FORMAT_VOXWARE_RT29
        );
        if !compressed && fmt.bits_per_sample < 8 {
            return false;
        }

        self.duration().is_ok_and(|d| d > Duration::ZERO)
    }

    /// Playback length of the audio data.
    ///
    /// GSM streams with a `fact` count use it; everything else divides the
    /// data size by the byte rate.
    ///
    /// # Errors
    ///
    /// * If the audio data cannot be located
    pub fn duration(&mut self) -> Result<Duration> {
        self.check()?;
        let result = self.locate_audio_data();
        self.record(result)?;

        let (Some(fmt), Some(data)) = (&self.fmt, &self.data) else {
            return Ok(Duration::ZERO);
        };

        let samples = self.compressed_samples().unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let duration = if fmt.effective_format_tag() == WAVE_FORMAT_GSM610
            && samples > 0
            && fmt.sample_rate > 0
        {
            Duration::from_secs_f64(f64::from(samples) / f64::from(fmt.sample_rate))
        } else if fmt.avg_bytes_per_sec > 0 {
            Duration::from_secs_f64(data.len as f64 / f64::from(fmt.avg_bytes_per_sec))
        } else {
            Duration::ZERO
        };

        Ok(duration)
    }

    /// Reads the header of the next chunk and advances past it.
    ///
    /// Returns `Ok(None)` at the end of the chunk list. The payload is left
    /// unread; use [`Self::read_chunk_payload`] to fetch it.
    ///
    /// # Errors
    ///
    /// * If the header is invalid
    /// * If a chunk header is truncated
    pub fn next_chunk(&mut self) -> Result<Option<ChunkHeader>> {
        self.check()?;
        let result = self.advance_chunk();
        self.record(result)
    }

    /// Reads the payload of a chunk returned by [`Self::next_chunk`].
    ///
    /// # Errors
    ///
    /// * If the stream fails
    pub fn read_chunk_payload(&mut self, header: &ChunkHeader) -> Result<Bytes> {
        self.check()?;
        let result = self.read_payload(header);
        self.record(result)
    }

    /// A copy of the parsed `fmt ` chunk.
    #[must_use]
    pub fn format_chunk(&self) -> Option<FmtChunk> {
        self.fmt.clone()
    }

    /// Zero until the header is read.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.fmt.as_ref().map_or(0, |f| f.sample_rate)
    }

    /// Zero until the header is read.
    #[must_use]
    pub fn channels(&self) -> u16 {
        self.fmt.as_ref().map_or(0, |f| f.channels)
    }

    /// Zero until the header is read.
    #[must_use]
    pub fn bits_per_sample(&self) -> u16 {
        self.fmt.as_ref().map_or(0, |f| f.bits_per_sample)
    }

    /// The effective format tag. Zero until the header is read.
    #[must_use]
    pub fn format_tag(&self) -> u16 {
        self.fmt.as_ref().map_or(0, FmtChunk::effective_format_tag)
    }

    /// Zero until the header is read.
    #[must_use]
    pub fn sample_bit_depth(&self) -> u16 {
        self.fmt.as_ref().map_or(0, FmtChunk::sample_bit_depth)
    }

    /// Declared size of the `data` chunk once located.
    #[must_use]
    pub fn audio_data_len(&self) -> Option<u64> {
        self.data.map(|d| d.len)
    }

    /// Sample count declared by the `fact` chunk.
    #[must_use]
    pub fn compressed_samples(&self) -> Option<u32> {
        self.metadata.get::<FactChunk>().map(|f| f.sample_count)
    }

    /// Whether every byte of the audio data has been read and handed out.
    #[must_use]
    pub fn eof(&self) -> bool {
        let drained = self.data.is_none_or(|d| d.remaining() == 0);
        #[cfg(feature = "gsm")]
        let drained = drained && !self.gsm.as_ref().is_some_and(GsmDecoder::has_pending);
        drained
    }

    /// Whether the walk has reached the audio data.
    #[must_use]
    pub const fn was_audio_accessed(&self) -> bool {
        self.pcm_accessed
    }

    /// A copy of the preserved unknown chunks.
    #[must_use]
    pub fn raw_chunks(&self) -> Vec<RawChunk> {
        self.raw_chunks.clone()
    }

    pub fn set_raw_chunks(&mut self, chunks: Vec<RawChunk>) {
        self.raw_chunks = chunks;
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub const fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn take_metadata(&mut self) -> Metadata {
        std::mem::take(&mut self.metadata)
    }

    fn check(&self) -> Result<()> {
        self.err.as_ref().map_or(Ok(()), |e| Err(e.clone()))
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if self.err.is_none() {
                log::debug!("decoder failed: {e}");
                self.err = Some(e.clone());
            }
        }
        result
    }

    fn chunk_at(&mut self, offset: u64) -> Result<Option<ChunkHeader>> {
        self.reader.seek(SeekFrom::Start(offset))?;
        read_chunk_header(&mut self.reader, offset)
    }

    fn read_payload(&mut self, header: &ChunkHeader) -> Result<Bytes> {
        self.reader.seek(SeekFrom::Start(header.offset))?;
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(u64::from(header.size))
            .read_to_end(&mut payload)?;

        if payload.len() < header.size as usize {
            log::warn!(
                "{} chunk declares {} bytes but only {} remain",
                header.id,
                header.size,
                payload.len()
            );
        }

        Ok(Bytes::from(payload))
    }

    fn parse_header(&mut self) -> Result<()> {
        if self.fmt.is_some() {
            return Ok(());
        }

        self.reader.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; 12];
        let read = read_full(&mut self.reader, &mut header)?;

        let tag = ChunkId([header[0], header[1], header[2], header[3]]);
        if read >= 4 && tag != ChunkId::RIFF {
            return Err(Error::InvalidContainerTag(tag));
        }
        if read < header.len() {
            return Err(Error::TruncatedChunkHeader { offset: 0, read });
        }
        let form = ChunkId([header[8], header[9], header[10], header[11]]);
        if form != ChunkId::WAVE {
            return Err(Error::InvalidFormType(form));
        }

        let mut offset = RIFF_HEADER_SIZE;
        let fmt = loop {
            let Some(chunk) = self.chunk_at(offset)? else {
                return Err(Error::FormatChunkNotFound);
            };
            if chunk.kind() == ChunkKind::Format {
                let payload = self.read_payload(&chunk)?;
                self.fmt_offset = chunk.offset;
                break FmtChunk::parse(&payload)?;
            }
            log::trace!("{} chunk precedes fmt", chunk.id);
            if chunk.kind() != ChunkKind::Data {
                self.offer_to_registry(&chunk)?;
            }
            offset = chunk.next_offset();
        };

        log::debug!("read_header: {fmt}");
        self.fmt = Some(fmt);
        self.state = DecoderState::HeaderRead;
        Ok(())
    }

    fn locate_audio_data(&mut self) -> Result<()> {
        self.parse_header()?;
        if self.data.is_some() {
            return Ok(());
        }

        loop {
            let Some(chunk) = self.chunk_at(self.walk_pos)? else {
                return Err(Error::AudioDataNotFound);
            };
            self.walk_pos = chunk.next_offset();

            match chunk.kind() {
                ChunkKind::Data => {
                    self.set_data(&chunk);
                    return Ok(());
                }
                ChunkKind::Format => {
                    if chunk.offset != self.fmt_offset {
                        log::warn!(
                            "ignoring duplicate fmt chunk at offset {}",
                            chunk.offset
                        );
                    }
                }
                // offered while looking for fmt
                _ if chunk.offset < self.fmt_offset => {}
                ChunkKind::Fact | ChunkKind::List | ChunkKind::Unrecognized => {
                    self.offer_to_registry(&chunk)?;
                }
            }
        }
    }

    fn offer_to_registry(&mut self, chunk: &ChunkHeader) -> Result<()> {
        let payload = self.read_payload(chunk)?;
        let tag = ChunkTag::sniff(chunk.id, &payload);
        if !self.registry.decode(&tag, &payload, &mut self.metadata)? {
            log::trace!("skipping unhandled {} chunk", chunk.id);
        }
        Ok(())
    }

    fn set_data(&mut self, chunk: &ChunkHeader) {
        log::debug!(
            "audio data: {} bytes at offset {}",
            chunk.size,
            chunk.offset
        );
        self.data = Some(DataSpan::new(chunk));
        self.state = DecoderState::AudioLocated;
        self.pcm_accessed = true;
    }

    fn collect_metadata(&mut self) -> Result<()> {
        self.parse_header()?;

        let mut raw_chunks = Vec::new();
        let mut offset = RIFF_HEADER_SIZE;
        let mut seen_data = false;
        let mut order = 0;

        while let Some(chunk) = self.chunk_at(offset)? {
            offset = chunk.next_offset();

            match chunk.kind() {
                ChunkKind::Format => {}
                ChunkKind::Data => {
                    seen_data = true;
                    if self.data.is_none() {
                        self.set_data(&chunk);
                        self.walk_pos = offset;
                    }
                }
                ChunkKind::Fact | ChunkKind::List | ChunkKind::Unrecognized => {
                    let payload = self.read_payload(&chunk)?;
                    let tag = ChunkTag::sniff(chunk.id, &payload);
                    if !self.registry.decode(&tag, &payload, &mut self.metadata)? {
                        log::trace!("preserving {} chunk ({} bytes)", chunk.id, payload.len());
                        raw_chunks.push(RawChunk::new(chunk.id, payload, order, !seen_data)?);
                    }
                }
            }
            order += 1;
        }

        log::debug!("read_metadata: {} raw chunk(s) preserved", raw_chunks.len());
        self.raw_chunks = raw_chunks;
        self.metadata_read = true;
        Ok(())
    }

    fn advance_chunk(&mut self) -> Result<Option<ChunkHeader>> {
        self.parse_header()?;
        let chunk = self.chunk_at(self.walk_pos)?;
        if let Some(chunk) = &chunk {
            self.walk_pos = chunk.next_offset();
        }
        Ok(chunk)
    }

    fn codec(&self) -> Result<SampleCodec> {
        SampleCodec::for_format(self.fmt.as_ref().ok_or(Error::FormatChunkNotFound)?)
    }

    fn decode_remaining(&mut self) -> Result<Vec<f32>> {
        self.locate_audio_data()?;
        let codec = self.codec()?;

        #[cfg(feature = "gsm")]
        if codec == SampleCodec::Gsm610 && self.gsm.is_none() {
            let cap = self.compressed_samples().unwrap_or(0);
            let span = self.data.as_mut().ok_or(Error::AudioDataNotFound)?;
            let mut reader = SpanReader {
                inner: &mut self.reader,
                span,
            };
            let samples = GsmDecoder::with_sample_cap(cap).decode_all(&mut reader)?;
            log::debug!("decode_all: {} GSM samples", samples.len());
            self.state = DecoderState::Exhausted;
            return Ok(samples);
        }

        let mut samples = Vec::new();
        let mut batch = vec![0.0f32; DECODE_BATCH];
        loop {
            let count = self.decode_with(codec, &mut batch)?;
            if count == 0 {
                break;
            }
            samples.extend_from_slice(&batch[..count]);
        }

        log::debug!("decode_all: {} samples", samples.len());
        Ok(samples)
    }

    fn decode_batch(&mut self, out: &mut [f32]) -> Result<usize> {
        self.locate_audio_data()?;
        let codec = self.codec()?;
        if out.is_empty() {
            return Ok(0);
        }
        self.decode_with(codec, out)
    }

    fn decode_with(&mut self, codec: SampleCodec, out: &mut [f32]) -> Result<usize> {
        #[cfg(feature = "gsm")]
        let cap = self.compressed_samples().unwrap_or(0);
        let span = self.data.as_mut().ok_or(Error::AudioDataNotFound)?;
        let mut reader = SpanReader {
            inner: &mut self.reader,
            span,
        };

        let count = match codec {
            SampleCodec::Linear(linear) => {
                decode_linear(linear, &mut reader, &mut self.scratch, out)?
            }
            #[cfg(feature = "gsm")]
            SampleCodec::Gsm610 => self
                .gsm
                .get_or_insert_with(|| GsmDecoder::with_sample_cap(cap))
                .decode_streaming(&mut reader, out)?,
        };

        self.state = if count == 0 {
            DecoderState::Exhausted
        } else {
            DecoderState::Streaming
        };
        Ok(count)
    }
}

fn decode_linear<R: Read + ?Sized>(
    codec: LinearCodec,
    reader: &mut R,
    scratch: &mut Vec<u8>,
    out: &mut [f32],
) -> Result<usize> {
    let sample_size = codec.bytes_per_sample();
    scratch.resize(out.len() * sample_size, 0);

    let read = read_full(reader, scratch)?;
    let partial = read % sample_size;
    if partial > 0 {
        log::debug!("dropping {partial} byte(s) of a partial trailing sample");
    }

    Ok(codec.decode_slice(&scratch[..read - partial], out))
}
