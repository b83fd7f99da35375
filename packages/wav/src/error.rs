use std::sync::Arc;

use thiserror::Error;

use crate::chunk::ChunkId;

/// WAV container and codec errors.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The stream does not start with a `RIFF` tag
    #[error("Invalid container tag: expected RIFF, found {0}")]
    InvalidContainerTag(ChunkId),

    /// The RIFF form type is not `WAVE`
    #[error("Invalid form type: expected WAVE, found {0}")]
    InvalidFormType(ChunkId),

    /// Fewer than 8 bytes were available for a chunk header
    #[error("Truncated chunk header at offset {offset}: {read} of 8 bytes")]
    TruncatedChunkHeader { offset: u64, read: usize },

    /// The stream ended before a `fmt ` chunk was found
    #[error("No fmt chunk found")]
    FormatChunkNotFound,

    /// The `fmt ` chunk could not be parsed
    #[error("Malformed fmt chunk ({size} bytes): {message}")]
    InvalidFormatChunk { size: usize, message: String },

    /// The stream ended before a `data` chunk was found
    #[error("No audio data chunk found")]
    AudioDataNotFound,

    /// A chunk payload violated its expected layout
    #[error("Malformed {id} chunk ({size} bytes): {message}")]
    InvalidChunk {
        id: ChunkId,
        size: usize,
        message: String,
    },

    /// A registered chunk handler rejected a chunk
    #[error("Chunk handler '{handler}' failed on {id} chunk")]
    ChunkHandler {
        id: ChunkId,
        handler: &'static str,
        #[source]
        source: Box<Self>,
    },

    /// A compressed format this crate detects but cannot decode
    #[error("Unsupported compressed format: {name} (format tag {tag})")]
    UnsupportedCompressedFormat { name: &'static str, tag: u16 },

    /// A known format declared with a bit depth it cannot carry
    #[error("Unsupported bit depth {bits} for {format} (format tag {tag})")]
    UnsupportedBitDepth {
        format: &'static str,
        tag: u16,
        bits: u16,
    },

    /// A format tag with no codec
    #[error("Unsupported format tag: {0:#06x}")]
    UnsupportedFormat(u16),

    /// The format can be decoded but not encoded
    #[error("Encoding not supported for {name} (format tag {tag})")]
    EncodeUnsupported { name: &'static str, tag: u16 },

    /// A GSM block shorter than 65 bytes
    #[error("GSM block too short: {0} bytes (need 65)")]
    GsmBlockTooShort(usize),

    /// A size that does not fit a 32-bit RIFF size field
    #[error("{id} chunk too large: {size} bytes")]
    ChunkTooLarge { id: ChunkId, size: u64 },

    /// A write was attempted after the encoder was closed
    #[error("Encoder is closed")]
    EncoderClosed,

    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

/// Result type for WAV operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn test_error_messages_carry_context() {
        let err = Error::UnsupportedBitDepth {
            format: "IEEE float",
            tag: 3,
            bits: 16,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported bit depth 16 for IEEE float (format tag 3)"
        );

        let err = Error::TruncatedChunkHeader {
            offset: 36,
            read: 3,
        };
        assert_eq!(
            err.to_string(),
            "Truncated chunk header at offset 36: 3 of 8 bytes"
        );

        assert_eq!(
            Error::UnsupportedFormat(0x55).to_string(),
            "Unsupported format tag: 0x0055"
        );
    }

    #[test_log::test]
    fn test_handler_error_exposes_source() {
        use std::error::Error as _;

        let err = Error::ChunkHandler {
            id: ChunkId::FACT,
            handler: "fact",
            source: Box::new(Error::InvalidChunk {
                id: ChunkId::FACT,
                size: 2,
                message: "need 4 bytes".to_string(),
            }),
        };

        assert_eq!(err.to_string(), "Chunk handler 'fact' failed on fact chunk");
        assert_eq!(
            err.source().map(ToString::to_string),
            Some("Malformed fact chunk (2 bytes): need 4 bytes".to_string())
        );
    }

    #[test_log::test]
    fn test_io_error_is_cloneable() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stream ended").into();
        let cloned = err.clone();
        assert_eq!(cloned.to_string(), "I/O error: stream ended");
    }
}
