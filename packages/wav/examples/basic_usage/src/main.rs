#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(
    clippy::multiple_crate_versions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

//! Basic WAV encoding and decoding example.
//!
//! This example shows how to:
//! - Encode a synthesized tone as 16-bit PCM with a preserved custom chunk
//! - Decode it back, both in one call and in fixed-size batches
//! - Re-encode the decoded stream as 8-bit mu-law

use std::{f32::consts::PI, io::Cursor};

use moosicbox_wav::{
    ChunkId, EncoderConfig, RawChunk, WavDecoder, WavEncoder,
    format::{WAVE_FORMAT_MULAW, WAVE_FORMAT_PCM},
};

const SAMPLE_RATE: u32 = 22_050;

fn tone(frequency: f32, seconds: f32) -> Vec<f32> {
    let len = (SAMPLE_RATE as f32 * seconds) as usize;
    (0..len)
        .map(|i| 0.6 * (2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    println!("MoosicBox WAV - Basic Usage Example");
    println!("===================================");

    // Encode half a second of A4 with an application chunk ahead of the audio
    let samples = tone(440.0, 0.5);
    let mut encoder = WavEncoder::new(
        Cursor::new(Vec::new()),
        EncoderConfig::new(SAMPLE_RATE, 16, 1, WAVE_FORMAT_PCM),
    );
    encoder.set_raw_chunks(vec![RawChunk::new(
        ChunkId(*b"demo"),
        b"synthesized tone".to_vec(),
        0,
        true,
    )?]);
    encoder.write_samples(&samples)?;
    let wav = encoder.into_inner()?.into_inner();
    println!("\n=== Encoding ===");
    println!("  Samples written: {}", samples.len());
    println!("  File size: {} bytes", wav.len());

    // Decode it back
    let mut decoder = WavDecoder::new(Cursor::new(wav));
    decoder.read_metadata()?;
    println!("\n=== Decoding ===");
    if let Some(fmt) = decoder.format_chunk() {
        println!("  Format: {fmt}");
    }
    println!("  Duration: {:.3}s", decoder.duration()?.as_secs_f64());
    for chunk in decoder.raw_chunks() {
        println!(
            "  Preserved chunk '{}' ({} bytes, before data: {})",
            chunk.id, chunk.size, chunk.before_data
        );
    }

    let decoded = decoder.decode_all()?;
    let max_error = samples
        .iter()
        .zip(&decoded)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    println!("  Samples decoded: {}", decoded.len());
    println!("  Max round-trip error: {max_error:.6}");

    // Stream it again in batches
    decoder.rewind()?;
    let mut buffer = [0.0f32; 1024];
    let mut batches = 0;
    while decoder.decode_into(&mut buffer)? > 0 {
        batches += 1;
    }
    log::debug!("streamed {batches} batches");
    println!("  Streamed in {batches} batch(es) of up to {}", buffer.len());

    // Transcode to mu-law, keeping the preserved chunk
    let mut transcoder = WavEncoder::new(
        Cursor::new(Vec::new()),
        EncoderConfig::new(
            decoder.sample_rate(),
            8,
            decoder.channels(),
            WAVE_FORMAT_MULAW,
        ),
    );
    transcoder.set_raw_chunks(decoder.raw_chunks());
    transcoder.write_samples(&decoded)?;
    let mulaw = transcoder.into_inner()?.into_inner();

    println!("\n=== Transcoding ===");
    println!("  mu-law file size: {} bytes", mulaw.len());

    Ok(())
}
