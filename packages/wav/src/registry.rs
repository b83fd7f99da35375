//! Pluggable chunk handlers.
//!
//! The container walker offers every chunk other than `fmt ` and `data` to a
//! [`ChunkRegistry`]. Handlers are evaluated in registration order and the
//! first whose predicate matches decodes the chunk into the shared
//! [`Metadata`] store. Chunks no handler claims are preserved as
//! [`crate::RawChunk`]s.
//!
//! On encode, every handler with an encode hook is asked for the chunks it
//! wants written. Those chunks are written after all other chunks.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

use crate::{
    Error, Result,
    chunk::{ChunkId, RawChunk},
};

/// A chunk identifier plus the sub-type sniffed from `LIST` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTag {
    pub id: ChunkId,
    pub list_type: Option<ChunkId>,
}

impl ChunkTag {
    /// Builds the tag for a chunk, reading the `LIST` type from its payload.
    #[must_use]
    pub fn sniff(id: ChunkId, payload: &[u8]) -> Self {
        let list_type = match (id, payload) {
            (ChunkId::LIST, [a, b, c, d, ..]) => Some(ChunkId([*a, *b, *c, *d])),
            _ => None,
        };
        Self { id, list_type }
    }
}

pub type ChunkMatcher = fn(&ChunkTag) -> bool;
pub type ChunkDecodeFn = fn(&ChunkTag, &[u8], &mut Metadata) -> Result<()>;
pub type ChunkEncodeFn = fn(&Metadata) -> Result<Vec<RawChunk>>;

/// A chunk handler: predicate, decoder and optional encoder.
#[derive(Clone, Copy)]
pub struct ChunkHandler {
    pub name: &'static str,
    pub matches: ChunkMatcher,
    pub decode: ChunkDecodeFn,
    pub encode: Option<ChunkEncodeFn>,
}

impl fmt::Debug for ChunkHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkHandler")
            .field("name", &self.name)
            .field("encode", &self.encode.is_some())
            .finish_non_exhaustive()
    }
}

/// Ordered handler list; the first matching handler wins.
#[derive(Debug, Clone)]
pub struct ChunkRegistry {
    handlers: Vec<ChunkHandler>,
}

impl Default for ChunkRegistry {
    /// A registry holding the built-in `fact` handler.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(FACT_HANDLER);
        registry
    }
}

impl ChunkRegistry {
    /// An empty registry; every chunk is preserved raw.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: ChunkHandler) {
        log::debug!("registering chunk handler '{}'", handler.name);
        self.handlers.push(handler);
    }

    #[must_use]
    pub fn handlers(&self) -> &[ChunkHandler] {
        &self.handlers
    }

    #[must_use]
    pub fn find(&self, tag: &ChunkTag) -> Option<&ChunkHandler> {
        self.handlers.iter().find(|h| (h.matches)(tag))
    }

    /// Routes a chunk to its handler. Returns `false` when none matched.
    ///
    /// # Errors
    ///
    /// * If the matching handler rejects the payload
    pub fn decode(&self, tag: &ChunkTag, payload: &[u8], metadata: &mut Metadata) -> Result<bool> {
        let Some(handler) = self.find(tag) else {
            return Ok(false);
        };

        log::trace!("chunk {} handled by '{}'", tag.id, handler.name);
        (handler.decode)(tag, payload, metadata).map_err(|e| Error::ChunkHandler {
            id: tag.id,
            handler: handler.name,
            source: Box::new(e),
        })?;

        Ok(true)
    }

    /// Collects the chunks every encode hook emits, in registration order.
    ///
    /// # Errors
    ///
    /// * If an encode hook fails
    pub fn encode(&self, metadata: &Metadata) -> Result<Vec<RawChunk>> {
        let mut chunks = Vec::new();
        for handler in &self.handlers {
            if let Some(encode) = handler.encode {
                chunks.extend(encode(metadata)?);
            }
        }
        Ok(chunks)
    }
}

/// Type-keyed store that chunk handlers populate on decode and read on
/// encode.
#[derive(Default)]
pub struct Metadata {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.entries
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Contents of a `fact` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactChunk {
    /// Samples per channel of the compressed stream
    pub sample_count: u32,
}

/// Built-in handler recording the `fact` sample count.
pub const FACT_HANDLER: ChunkHandler = ChunkHandler {
    name: "fact",
    matches: |tag| tag.id == ChunkId::FACT,
    decode: decode_fact,
    encode: None,
};

fn decode_fact(tag: &ChunkTag, payload: &[u8], metadata: &mut Metadata) -> Result<()> {
    let [a, b, c, d, ..] = payload else {
        return Err(Error::InvalidChunk {
            id: tag.id,
            size: payload.len(),
            message: "need a 4-byte sample count".to_string(),
        });
    };

    let sample_count = u32::from_le_bytes([*a, *b, *c, *d]);
    log::debug!("fact chunk declares {sample_count} samples");
    metadata.insert(FactChunk { sample_count });
    Ok(())
}
