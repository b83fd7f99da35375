#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

use std::io::Cursor;

use moosicbox_wav::{
    ChunkHandler, ChunkId, ChunkRegistry, ChunkTag, EncoderConfig, Error, Metadata, RawChunk,
    WavDecoder, WavEncoder, format::WAVE_FORMAT_PCM, registry::ChunkEncodeFn,
};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comment(String);

fn is_info_list(tag: &ChunkTag) -> bool {
    tag.id == ChunkId::LIST && tag.list_type == Some(ChunkId(*b"INFO"))
}

fn decode_comment(
    tag: &ChunkTag,
    payload: &[u8],
    metadata: &mut Metadata,
) -> moosicbox_wav::Result<()> {
    // LIST type, then a single ICMT sub-chunk
    let text = payload.get(12..).ok_or_else(|| Error::InvalidChunk {
        id: tag.id,
        size: payload.len(),
        message: "missing ICMT entry".to_string(),
    })?;
    let text = text.split(|&b| b == 0).next().unwrap_or_default();
    metadata.insert(Comment(String::from_utf8_lossy(text).into_owned()));
    Ok(())
}

fn encode_comment(metadata: &Metadata) -> moosicbox_wav::Result<Vec<RawChunk>> {
    let Some(Comment(text)) = metadata.get::<Comment>() else {
        return Ok(Vec::new());
    };

    let mut entry = text.as_bytes().to_vec();
    entry.push(0);
    let mut payload = b"INFOICMT".to_vec();
    payload.extend_from_slice(&u32::try_from(entry.len()).unwrap().to_le_bytes());
    payload.extend_from_slice(&entry);
    if entry.len() % 2 == 1 {
        payload.push(0);
    }

    Ok(vec![RawChunk::new(ChunkId::LIST, payload, 0, false)?])
}

const COMMENT_HANDLER: ChunkHandler = ChunkHandler {
    name: "info-comment",
    matches: is_info_list,
    decode: decode_comment,
    encode: Some(encode_comment as ChunkEncodeFn),
};

fn registry() -> ChunkRegistry {
    let mut registry = ChunkRegistry::default();
    registry.register(COMMENT_HANDLER);
    registry
}

fn chunk_ids(bytes: &[u8]) -> Vec<ChunkId> {
    let mut decoder = WavDecoder::new(Cursor::new(bytes.to_vec()));
    std::iter::from_fn(|| decoder.next_chunk().unwrap())
        .map(|c| c.id)
        .collect()
}

#[test]
fn test_unknown_chunks_survive_round_trip() {
    let mut encoder = WavEncoder::new(
        Cursor::new(Vec::new()),
        EncoderConfig::new(8_000, 16, 1, WAVE_FORMAT_PCM),
    );
    encoder.set_raw_chunks(vec![
        RawChunk::new(ChunkId(*b"bext"), b"broadcast".to_vec(), 1, true).unwrap(),
        RawChunk::new(ChunkId(*b"cue "), vec![1, 2, 3, 4], 3, false).unwrap(),
        RawChunk::new(ChunkId(*b"smpl"), vec![9; 7], 4, false).unwrap(),
    ]);
    encoder.write_samples(&[0.25, -0.25, 0.5]).unwrap();
    let bytes = encoder.into_inner().unwrap().into_inner();

    let mut decoder = WavDecoder::new(Cursor::new(bytes.clone()));
    decoder.read_metadata().unwrap();
    let raw = decoder.raw_chunks();

    let summary: Vec<(ChunkId, Vec<u8>, bool)> = raw
        .iter()
        .map(|c| (c.id, c.data.to_vec(), c.before_data))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ChunkId(*b"bext"), b"broadcast".to_vec(), true),
            (ChunkId(*b"cue "), vec![1, 2, 3, 4], false),
            (ChunkId(*b"smpl"), vec![9; 7], false),
        ]
    );
    assert_eq!(decoder.decode_all().unwrap(), vec![0.25, -0.25, 0.5]);

    // re-encode through from_decoder reproduces the file byte for byte
    let samples = {
        decoder.rewind().unwrap();
        decoder.decode_all().unwrap()
    };
    let mut encoder = WavEncoder::from_decoder(Cursor::new(Vec::new()), &decoder);
    encoder.write_samples(&samples).unwrap();
    assert_eq!(encoder.into_inner().unwrap().into_inner(), bytes);
}

#[test]
fn test_odd_sized_chunks_keep_alignment() {
    let mut encoder = WavEncoder::new(
        Cursor::new(Vec::new()),
        EncoderConfig::new(8_000, 8, 1, WAVE_FORMAT_PCM),
    );
    encoder.set_raw_chunks(vec![
        RawChunk::new(ChunkId(*b"odd1"), vec![1], 0, true).unwrap(),
        RawChunk::new(ChunkId(*b"odd2"), vec![2, 2, 2], 1, false).unwrap(),
    ]);
    encoder.write_samples(&[0.0]).unwrap();
    let bytes = encoder.into_inner().unwrap().into_inner();

    assert_eq!(bytes.len() % 2, 0);
    assert_eq!(
        chunk_ids(&bytes),
        vec![
            ChunkId::FMT,
            ChunkId(*b"odd1"),
            ChunkId::DATA,
            ChunkId(*b"odd2")
        ]
    );
}

#[test]
fn test_metadata_hook_chunks_are_written_last() {
    let mut metadata = Metadata::new();
    metadata.insert(Comment("recorded on a train".to_string()));

    let mut encoder = WavEncoder::new(
        Cursor::new(Vec::new()),
        EncoderConfig::new(8_000, 16, 1, WAVE_FORMAT_PCM),
    );
    encoder.set_registry(registry());
    encoder.set_metadata(metadata);
    encoder.set_raw_chunks(vec![
        RawChunk::new(ChunkId(*b"tail"), vec![0; 4], 2, false).unwrap(),
    ]);
    encoder.write_samples(&[0.0; 10]).unwrap();
    let bytes = encoder.into_inner().unwrap().into_inner();

    assert_eq!(
        chunk_ids(&bytes),
        vec![
            ChunkId::FMT,
            ChunkId::DATA,
            ChunkId(*b"tail"),
            ChunkId::LIST
        ]
    );

    let mut decoder = WavDecoder::with_registry(Cursor::new(bytes), registry());
    decoder.read_metadata().unwrap();

    assert_eq!(
        decoder.metadata().get::<Comment>(),
        Some(&Comment("recorded on a train".to_string()))
    );
    // handled chunks are not preserved raw
    assert_eq!(decoder.raw_chunks().len(), 1);
}

#[test]
fn test_list_without_handler_is_preserved_raw() {
    let mut metadata = Metadata::new();
    metadata.insert(Comment("x".to_string()));

    let mut encoder = WavEncoder::new(
        Cursor::new(Vec::new()),
        EncoderConfig::new(8_000, 16, 1, WAVE_FORMAT_PCM),
    );
    encoder.set_registry(registry());
    encoder.set_metadata(metadata);
    let bytes = encoder.into_inner().unwrap().into_inner();

    let mut decoder = WavDecoder::new(Cursor::new(bytes));
    decoder.read_metadata().unwrap();
    let raw = decoder.raw_chunks();

    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].id, ChunkId::LIST);
    assert_eq!(&raw[0].data[..4], b"INFO");
}

#[test]
fn test_failing_handler_error_is_sticky() {
    let mut body = b"WAVE".to_vec();
    body.extend_from_slice(b"fmt \x10\0\0\0");
    body.extend_from_slice(&[1, 0, 1, 0, 0x40, 0x1f, 0, 0, 0x80, 0x3e, 0, 0, 2, 0, 16, 0]);
    body.extend_from_slice(b"fact\x02\0\0\0\x01\x02");
    body.extend_from_slice(b"data\0\0\0\0");
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&u32::try_from(body.len()).unwrap().to_le_bytes());
    bytes.extend(body);

    let mut decoder = WavDecoder::new(Cursor::new(bytes));
    let err = decoder.forward_to_audio_data().unwrap_err();

    assert!(matches!(
        err,
        Error::ChunkHandler {
            handler: "fact",
            ..
        }
    ));
    assert!(matches!(
        decoder.decode_all().unwrap_err(),
        Error::ChunkHandler { .. }
    ));
}

#[test]
fn test_chunk_before_fmt_is_offered_to_registry() {
    let mut body = b"WAVE".to_vec();
    body.extend_from_slice(b"fact\x04\0\0\0\x10\0\0\0");
    body.extend_from_slice(b"fmt \x10\0\0\0");
    body.extend_from_slice(&[1, 0, 1, 0, 0x40, 0x1f, 0, 0, 0x80, 0x3e, 0, 0, 2, 0, 16, 0]);
    body.extend_from_slice(b"data\x02\0\0\0\0\x40");
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&u32::try_from(body.len()).unwrap().to_le_bytes());
    bytes.extend(body);

    let mut decoder = WavDecoder::new(Cursor::new(bytes));
    assert_eq!(decoder.decode_all().unwrap(), vec![0.5]);
    assert_eq!(decoder.compressed_samples(), Some(16));
}
