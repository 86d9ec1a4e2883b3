//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! It selects an input device, configures the stream and forwards fixed-size frames
//! to the pitch session over a channel.
//!
//! Multi-channel devices are reduced to their first channel before framing.

use anyhow::{Context, Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

use crate::synth::SAMPLE_RATE;

/// Audio buffer size for processing frames.
///
/// Larger buffers provide more frequency resolution but increase latency.
pub const BUFFER_SIZE: usize = 2048;

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Configures a mono f32 stream as close to 44.1 kHz as the device allows
/// 3. Sets up a callback that forwards `BUFFER_SIZE` frames over `sender`
///
/// # Arguments
/// * `sender` - Channel sender for streaming audio frames to the analysis thread
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
/// * `Err(e)` - Error if audio setup fails
pub fn start_audio_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("[AUDIO] Using audio input device: {}", device.name()?);

    let configs = device
        .supported_input_configs()
        .context("Failed to query input configurations")?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = clamp_rate(&supported_config, SAMPLE_RATE);
    let config: cpal::StreamConfig = supported_config.with_sample_rate(sample_rate).into();
    let sample_rate_val = sample_rate.0;
    let channels = config.channels as usize;

    log::info!("[AUDIO] Selected sample rate: {} Hz", sample_rate_val);

    let err_fn = |err| log::error!("[AUDIO] An error occurred on the input stream: {}", err);

    // This buffer accumulates mono audio data from the callback.
    let mut audio_buffer = Vec::with_capacity(BUFFER_SIZE * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            forward_frames(&mut audio_buffer, data, channels, &sender);
        },
        err_fn,
        None,
    )?;

    stream.play().context("Failed to start input stream")?;

    Ok((stream, sample_rate_val))
}

/// Appends interleaved input to `pending` (first channel only) and sends every
/// complete `BUFFER_SIZE` frame. Never blocks the audio callback: on a bounded
/// channel that is full, the frame is dropped.
fn forward_frames(pending: &mut Vec<f32>, data: &[f32], channels: usize, sender: &Sender<Vec<f32>>) {
    if channels <= 1 {
        pending.extend_from_slice(data);
    } else {
        pending.extend(data.chunks(channels).map(|frame| frame[0]));
    }

    while pending.len() >= BUFFER_SIZE {
        let frame_to_send = pending[..BUFFER_SIZE].to_vec();
        if sender.try_send(frame_to_send).is_err() {
            log::debug!("[AUDIO] Analysis is behind, dropping a frame");
        }
        pending.drain(..BUFFER_SIZE);
    }
}

/// Picks the sample rate closest to `target` that the config range supports.
pub(crate) fn clamp_rate(config: &SupportedStreamConfigRange, target: u32) -> cpal::SampleRate {
    let min = config.min_sample_rate().0;
    let max = config.max_sample_rate().0;
    cpal::SampleRate(target.clamp(min, max))
}

/// Finds the best supported input configuration for the target sample rate.
///
/// Prefers mono 32-bit float, then any f32 layout, each ranked by how close
/// the supported range comes to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    let distance = |c: &SupportedStreamConfigRange| {
        let rate = clamp_rate(c, target_rate).0;
        (rate as i64 - target_rate as i64).abs()
    };
    let (mono, other): (Vec<_>, Vec<_>) = configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .partition(|c| c.channels() == 1);

    mono.into_iter()
        .min_by_key(distance)
        .or_else(|| other.into_iter().min_by_key(distance))
}
