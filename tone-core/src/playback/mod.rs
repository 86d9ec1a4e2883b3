//! # Playback Module
//!
//! The platform sink behind `play_tone` and `play_chord`. One interface, two
//! implementations chosen at startup:
//! - [`OscillatorGraphPlayback`] drives a [`ToneGenerator`] straight from the
//!   output callback, so no sample buffer is ever materialised
//! - [`EncodedBufferPlayback`] synthesises, encodes to WAV, loads the bytes back
//!   through a PCM decoder and plays the decoded samples
//!
//! The difference is a capability, not a behaviour: both play the same tone.

mod output;

use std::io::Cursor;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToneError};
use crate::synth::{ToneGenerator, ToneRequest, synthesize_request};
use crate::wav;
use output::{ScopedStream, open_output};

/// How a play request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The whole tone was played.
    Completed,
    /// `stop` was called while the tone was playing.
    Stopped,
    /// The platform failed; nothing (or only part of the tone) was heard.
    Failed,
}

/// A platform audio sink able to play one tone at a time.
pub trait PlaybackAdapter: Send + Sync {
    /// Plays `request` to completion, returning early when `stop` fires.
    ///
    /// Implementations acquire their native resources inside this call and
    /// release them before returning, whether playback succeeded or not.
    fn play(&self, request: &ToneRequest, stop: &Receiver<()>) -> Result<PlaybackOutcome>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Which adapter to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackKind {
    /// Direct oscillator graph.
    #[default]
    Graph,
    /// Encode to WAV, then load and play.
    Encoded,
}

impl FromStr for PlaybackKind {
    type Err = ToneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graph" | "oscillator" => Ok(PlaybackKind::Graph),
            "encoded" | "wav" => Ok(PlaybackKind::Encoded),
            other => Err(ToneError::invalid(format!("unknown playback kind '{other}'"))),
        }
    }
}

/// Builds the adapter for `kind`.
pub fn select_adapter(kind: PlaybackKind) -> Box<dyn PlaybackAdapter> {
    match kind {
        PlaybackKind::Graph => Box::new(OscillatorGraphPlayback),
        PlaybackKind::Encoded => Box::new(EncodedBufferPlayback),
    }
}

fn expected_length(request: &ToneRequest) -> Duration {
    Duration::from_secs_f32(request.duration_sec)
}

/// Plays tones by pulling samples from a [`ToneGenerator`] inside the output callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct OscillatorGraphPlayback;

impl PlaybackAdapter for OscillatorGraphPlayback {
    fn play(&self, request: &ToneRequest, stop: &Receiver<()>) -> Result<PlaybackOutcome> {
        let (device, config) = open_output(None)?;
        let generator = ToneGenerator::new(request.clone(), config.sample_rate().0);
        let stream = ScopedStream::start(&device, &config, generator)?;
        Ok(stream.wait(expected_length(request), stop))
    }

    fn name(&self) -> &'static str {
        "oscillator-graph"
    }
}

/// Plays tones by encoding them to WAV and loading the encoded buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodedBufferPlayback;

impl EncodedBufferPlayback {
    /// Decodes a WAV container into mono float samples and its sample rate.
    fn load(bytes: Vec<u8>) -> anyhow::Result<(Vec<f32>, u32)> {
        let reader = hound::WavReader::new(Cursor::new(bytes)).context("Failed to load encoded tone")?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let samples = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to decode encoded tone")?;
        let mono = samples
            .iter()
            .step_by(channels)
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect();
        Ok((mono, spec.sample_rate))
    }
}

impl PlaybackAdapter for EncodedBufferPlayback {
    fn play(&self, request: &ToneRequest, stop: &Receiver<()>) -> Result<PlaybackOutcome> {
        let bytes = wav::encode(&synthesize_request(request));
        let (samples, sample_rate) = Self::load(bytes)?;
        let (device, config) = open_output(Some(sample_rate))?;
        let stream = ScopedStream::start(&device, &config, samples.into_iter())?;
        Ok(stream.wait(expected_length(request), stop))
    }

    fn name(&self) -> &'static str {
        "encoded-buffer"
    }
}
