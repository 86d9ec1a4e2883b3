//! # Audio Encoder Module
//!
//! Serialises a [`SampleBuffer`] into an uncompressed PCM WAV container: a fixed
//! 44-byte RIFF header followed by little-endian 16-bit samples. This is the
//! portability boundary towards platforms that can only load and play an
//! encoded buffer. Encoding is pure and bit-exact.

use std::path::Path;

use anyhow::Context;

use crate::error::{Result, ToneError};
use crate::synth::{SAMPLE_RATE, SampleBuffer};

/// Size of the RIFF/WAVE header written before the samples.
pub const HEADER_LEN: usize = 44;

/// PCM format fields written into the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for WavFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl WavFormat {
    fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Encodes a buffer as mono 16-bit PCM at 44.1 kHz.
pub fn encode(buffer: &SampleBuffer) -> Vec<u8> {
    write_container(buffer.samples(), WavFormat::default())
}

/// Encodes interleaved samples with an explicit format.
///
/// # Returns
/// * `Ok(bytes)` - Header plus sample data
/// * `Err(InvalidParameter)` - Zero channels, zero sample rate or a bit depth other than 16
pub fn encode_with(samples: &[i16], format: WavFormat) -> Result<Vec<u8>> {
    if format.bits_per_sample != 16 {
        return Err(ToneError::invalid(format!(
            "{} bits per sample is not supported, only 16",
            format.bits_per_sample
        )));
    }
    if format.channels == 0 || format.sample_rate == 0 {
        return Err(ToneError::invalid("channels and sample rate must be non-zero"));
    }
    Ok(write_container(samples, format))
}

fn write_container(samples: &[i16], format: WavFormat) -> Vec<u8> {
    let data_size = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(HEADER_LEN + samples.len() * 2);

    // RIFF chunk
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    // fmt subchunk
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&format.channels.to_le_bytes());
    bytes.extend_from_slice(&format.sample_rate.to_le_bytes());
    bytes.extend_from_slice(&format.byte_rate().to_le_bytes());
    bytes.extend_from_slice(&format.block_align().to_le_bytes());
    bytes.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    // data subchunk
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    bytes
}

/// Encodes a buffer and writes it to `path`.
pub fn write_wav(path: impl AsRef<Path>, buffer: &SampleBuffer) -> anyhow::Result<()> {
    let path = path.as_ref();
    std::fs::write(path, encode(buffer))
        .with_context(|| format!("Failed to write WAV file: {}", path.display()))?;
    log::info!("[WAV] Wrote {} samples to {}", buffer.len(), path.display());
    Ok(())
}
