#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! # `MoosicBox` WAV Codec
//!
//! RIFF/WAVE container decoding and encoding.
//!
//! Decodes integer PCM (8/16/24/32-bit), IEEE float (32/64-bit), A-law,
//! mu-law and GSM 06.10 (WAV49) audio to normalized `f32` samples, and
//! encodes every format except GSM. Chunks the container does not interpret
//! are either decoded by a pluggable [`ChunkRegistry`] handler or preserved
//! byte for byte so they survive a decode/encode round trip.
//!
//! ```no_run
//! use std::fs::File;
//!
//! use moosicbox_wav::WavDecoder;
//!
//! let mut decoder = WavDecoder::new(File::open("speech.wav")?);
//! let samples = decoder.decode_all()?;
//! println!("{} samples @ {} Hz", samples.len(), decoder.sample_rate());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod chunk;
pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fixed;
pub mod format;
#[cfg(feature = "gsm")]
pub mod gsm;
pub mod registry;

pub use chunk::{ChunkHeader, ChunkId, ChunkKind, RawChunk};
pub use codec::{LinearCodec, SampleCodec};
pub use decoder::{DecoderState, WavDecoder};
pub use encoder::{EncoderConfig, FrameValue, WavEncoder};
pub use error::{Error, Result};
pub use format::{FmtChunk, FmtExtensible};
pub use registry::{ChunkHandler, ChunkRegistry, ChunkTag, FactChunk, Metadata};
