//! Audio output shared by both playback adapters.
//!
//! A [`ScopedStream`] owns one cpal output stream for the lifetime of one tone.
//! It is paused and dropped when the guard goes out of scope, on every exit path.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::{Receiver, Sender};

use super::PlaybackOutcome;
use crate::audio::clamp_rate;

/// Extra time allowed past the nominal tone length before giving up on the stream.
const COMPLETION_GRACE: Duration = Duration::from_millis(1000);

/// Lets the device drain its last callback buffer before the stream is paused.
const DRAIN_DELAY: Duration = Duration::from_millis(50);

/// Opens the default output device.
///
/// With `sample_rate` set, only configurations supporting exactly that rate are
/// accepted (an encoded buffer must play at its container rate). Without it,
/// the device's default configuration is used.
pub(crate) fn open_output(
    sample_rate: Option<u32>,
) -> Result<(cpal::Device, cpal::SupportedStreamConfig)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No audio output device available"))?;

    let config = match sample_rate {
        None => device
            .default_output_config()
            .context("Failed to get default output config")?,
        Some(rate) => device
            .supported_output_configs()
            .context("Failed to query output configurations")?
            .filter(|c| clamp_rate(c, rate).0 == rate)
            .min_by_key(|c| (c.sample_format() != cpal::SampleFormat::F32, c.channels()))
            .map(|c| c.with_sample_rate(cpal::SampleRate(rate)))
            .ok_or_else(|| anyhow!("No output configuration supports {} Hz", rate))?,
    };

    log::debug!(
        "[PLAYBACK] Output device {} at {} Hz, {} channel(s), {:?}",
        device.name().unwrap_or_else(|_| "<unnamed>".to_string()),
        config.sample_rate().0,
        config.channels(),
        config.sample_format()
    );
    Ok((device, config))
}

/// An output stream that lives exactly as long as one tone.
pub(crate) struct ScopedStream {
    stream: cpal::Stream,
    finished: Receiver<()>,
}

impl ScopedStream {
    /// Builds and starts a stream that plays `source` once, then silence.
    pub(crate) fn start<S>(
        device: &cpal::Device,
        config: &cpal::SupportedStreamConfig,
        source: S,
    ) -> Result<Self>
    where
        S: Iterator<Item = f32> + Send + 'static,
    {
        let (finished_tx, finished) = crossbeam_channel::bounded(1);
        let stream_config: cpal::StreamConfig = config.config();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => create_stream::<f32, S>(device, &stream_config, source, finished_tx)?,
            cpal::SampleFormat::I16 => create_stream::<i16, S>(device, &stream_config, source, finished_tx)?,
            cpal::SampleFormat::U16 => create_stream::<u16, S>(device, &stream_config, source, finished_tx)?,
            other => bail!("Unsupported sample format: {:?}", other),
        };

        stream.play().context("Failed to play audio stream")?;
        log::debug!("[PLAYBACK] Output stream started");
        Ok(Self { stream, finished })
    }

    /// Blocks until the source is exhausted, a stop is requested or the
    /// expected length plus a grace period has passed.
    pub(crate) fn wait(&self, expected: Duration, stop: &Receiver<()>) -> PlaybackOutcome {
        crossbeam_channel::select! {
            recv(self.finished) -> _ => {
                std::thread::sleep(DRAIN_DELAY);
                PlaybackOutcome::Completed
            }
            recv(stop) -> _ => {
                log::info!("[PLAYBACK] Tone stopped");
                PlaybackOutcome::Stopped
            }
            default(expected + COMPLETION_GRACE) => {
                log::warn!("[PLAYBACK] Stream never reported completion, releasing it");
                PlaybackOutcome::Completed
            }
        }
    }
}

impl Drop for ScopedStream {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("[PLAYBACK] Error pausing stream: {}", e);
        }
        log::debug!("[PLAYBACK] Output stream released");
    }
}

fn create_stream<T, S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut source: S,
    finished: Sender<()>,
) -> Result<cpal::Stream>
where
    T: Sample + Send + 'static + SizedSample + FromSample<f32>,
    S: Iterator<Item = f32> + Send + 'static,
{
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("[PLAYBACK] An error occurred on the output stream: {}", err);
    let mut exhausted = false;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = match source.next() {
                    Some(value) => value,
                    None => {
                        if !exhausted {
                            exhausted = true;
                            let _ = finished.try_send(());
                        }
                        0.0
                    }
                };

                let value_t = T::from_sample(value);
                for sample in frame.iter_mut() {
                    *sample = value_t;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
