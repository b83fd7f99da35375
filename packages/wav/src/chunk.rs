//! RIFF chunk primitives.
//!
//! A chunk is a 4-byte identifier, a little-endian `u32` payload size, the
//! payload, and one zero pad byte when the size is odd. The pad byte is never
//! part of the payload.

use std::{fmt, io::Read};

use bytes::Bytes;

use crate::{Error, Result};

/// Size of a chunk header: identifier plus payload size.
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// Four-character chunk identifier, stored as raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    pub const RIFF: Self = Self(*b"RIFF");
    pub const WAVE: Self = Self(*b"WAVE");
    pub const FMT: Self = Self(*b"fmt ");
    pub const DATA: Self = Self(*b"data");
    pub const FACT: Self = Self(*b"fact");
    pub const LIST: Self = Self(*b"LIST");

    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// The identifier with trailing spaces and nulls removed.
    #[must_use]
    pub fn trimmed(&self) -> &[u8] {
        trim_fixed(&self.0)
    }
}

impl From<[u8; 4]> for ChunkId {
    fn from(value: [u8; 4]) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", char::from(b))?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId(\"{self}\")")
    }
}

/// Strips trailing spaces and nulls from a fixed-width byte field.
#[must_use]
pub fn trim_fixed(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Copies `value` into a fixed-width field, null-padding or truncating it.
#[must_use]
pub fn to_fixed<const N: usize>(value: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = value.len().min(N);
    out[..len].copy_from_slice(&value[..len]);
    out
}

/// Number of pad bytes that follow a payload of `size` bytes.
#[must_use]
pub const fn pad_len(size: u64) -> u64 {
    size & 1
}

/// The closed set of chunk kinds the container walker dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Format,
    Data,
    Fact,
    List,
    Unrecognized,
}

impl ChunkKind {
    #[must_use]
    pub fn of(id: ChunkId) -> Self {
        match id {
            ChunkId::FMT => Self::Format,
            ChunkId::DATA => Self::Data,
            ChunkId::FACT => Self::Fact,
            ChunkId::LIST => Self::List,
            _ => Self::Unrecognized,
        }
    }
}

/// A chunk header located in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: ChunkId,
    /// Declared payload size, excluding the pad byte
    pub size: u32,
    /// Absolute offset of the first payload byte
    pub offset: u64,
}

impl ChunkHeader {
    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        ChunkKind::of(self.id)
    }

    /// Absolute offset of the next chunk header.
    #[must_use]
    pub const fn next_offset(&self) -> u64 {
        let size = self.size as u64;
        self.offset + size + pad_len(size)
    }
}

/// Reads an 8-byte chunk header whose first byte sits at `offset`.
///
/// Returns `Ok(None)` at a clean end of stream.
///
/// # Errors
///
/// * If only part of a header is available
/// * If the underlying reader fails
pub fn read_chunk_header<R: Read>(reader: &mut R, offset: u64) -> Result<Option<ChunkHeader>> {
    let mut buf = [0u8; 8];
    let read = read_full(reader, &mut buf)?;

    match read {
        0 => Ok(None),
        8 => {
            let id = ChunkId([buf[0], buf[1], buf[2], buf[3]]);
            let size = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
            Ok(Some(ChunkHeader {
                id,
                size,
                offset: offset + CHUNK_HEADER_SIZE,
            }))
        }
        read => Err(Error::TruncatedChunkHeader { offset, read }),
    }
}

/// Reads until `buf` is full or the reader is exhausted.
///
/// # Errors
///
/// * If the underlying reader fails
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A chunk no registered handler claimed, preserved for round-tripping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub id: ChunkId,
    /// Always equal to `data.len()`
    pub size: u32,
    pub data: Bytes,
    /// Encounter index among the chunks following the RIFF header
    pub order: usize,
    pub before_data: bool,
}

impl RawChunk {
    /// Creates a chunk whose declared size matches its payload.
    ///
    /// # Errors
    ///
    /// * If the payload does not fit a 32-bit size field
    pub fn new(id: ChunkId, data: impl Into<Bytes>, order: usize, before_data: bool) -> Result<Self> {
        let data = data.into();
        let size = u32::try_from(data.len()).map_err(|_| Error::ChunkTooLarge {
            id,
            size: data.len() as u64,
        })?;

        Ok(Self {
            id,
            size,
            data,
            order,
            before_data,
        })
    }

    /// Bytes this chunk occupies on the wire, pad included.
    #[must_use]
    pub const fn wire_len(&self) -> u64 {
        let size = self.size as u64;
        CHUNK_HEADER_SIZE + size + pad_len(size)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case(b"INFO", b"INFO"; "no padding")]
    #[test_case(b"ab  ", b"ab"; "trailing spaces")]
    #[test_case(b"ab\0\0", b"ab"; "trailing nulls")]
    #[test_case(b"a \0 ", b"a"; "mixed padding")]
    #[test_case(b"\0\0\0\0", b""; "empty")]
    fn test_trim_fixed(input: &[u8; 4], expected: &[u8]) {
        assert_eq!(trim_fixed(input), expected);
    }

    #[test_log::test]
    fn test_to_fixed_pads_and_truncates() {
        assert_eq!(to_fixed::<6>(b"abc"), *b"abc\0\0\0");
        assert_eq!(to_fixed::<2>(b"abc"), *b"ab");
    }

    #[test_log::test]
    fn test_chunk_id_display_escapes_binary() {
        assert_eq!(ChunkId::FMT.to_string(), "fmt ");
        assert_eq!(ChunkId([b'a', 0, 0xff, b'z']).to_string(), "a\\x00\\xffz");
        assert_eq!(ChunkId::FMT.trimmed(), b"fmt");
    }

    #[test_case(ChunkId::FMT, ChunkKind::Format)]
    #[test_case(ChunkId::DATA, ChunkKind::Data)]
    #[test_case(ChunkId::FACT, ChunkKind::Fact)]
    #[test_case(ChunkId::LIST, ChunkKind::List)]
    #[test_case(ChunkId(*b"JUNK"), ChunkKind::Unrecognized)]
    fn test_chunk_kind_of(id: ChunkId, expected: ChunkKind) {
        assert_eq!(ChunkKind::of(id), expected);
    }

    #[test_log::test]
    fn test_read_chunk_header() {
        let mut reader = Cursor::new(b"data\x05\x00\x00\x00hello\x00".to_vec());
        let header = read_chunk_header(&mut reader, 36).unwrap().unwrap();

        assert_eq!(header.id, ChunkId::DATA);
        assert_eq!(header.size, 5);
        assert_eq!(header.offset, 44);
        assert_eq!(header.next_offset(), 50);
    }

    #[test_log::test]
    fn test_read_chunk_header_at_end_of_stream() {
        let mut reader = Cursor::new(Vec::new());
        assert_eq!(read_chunk_header(&mut reader, 12).unwrap(), None);
    }

    #[test_log::test]
    fn test_read_chunk_header_truncated() {
        let mut reader = Cursor::new(b"dat".to_vec());
        let err = read_chunk_header(&mut reader, 12).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedChunkHeader {
                offset: 12,
                read: 3
            }
        ));
    }

    #[test_log::test]
    fn test_raw_chunk_wire_len_includes_pad() {
        let chunk = RawChunk::new(ChunkId(*b"abcd"), vec![1, 2, 3], 0, true).unwrap();
        assert_eq!(chunk.size, 3);
        assert_eq!(chunk.wire_len(), 12);

        let chunk = RawChunk::new(ChunkId(*b"abcd"), vec![1, 2], 0, true).unwrap();
        assert_eq!(chunk.wire_len(), 10);
    }
}
