//! # Waveform Synthesis Module
//!
//! Procedural tone generation with no sampled assets. Every tone is built by
//! additive synthesis: each requested frequency contributes a weighted stack of
//! harmonics of the timbre's base shape, the stack is normalised by
//! `frequencies * harmonics`, shaped by a four-stage ADSR envelope, scaled by
//! volume and clamped to [-1, 1].
//!
//! Two views over the same math are provided:
//! - [`ToneGenerator`], a per-sample iterator the direct oscillator graph pulls from
//! - [`synthesize`], which materialises a 16-bit [`SampleBuffer`] for encoding
//!
//! All functions are pure and deterministic.

use crate::error::{Result, ToneError};
use crate::timbre::Timbre;

/// Sample rate of every materialised buffer.
pub const SAMPLE_RATE: u32 = 44_100;

/// A single tone or chord to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneRequest {
    /// One frequency for a note, 3-4 for a chord.
    pub frequencies: Vec<f32>,
    pub timbre: Timbre,
    pub duration_sec: f32,
    /// Output gain in [0, 1].
    pub volume: f32,
}

impl ToneRequest {
    /// Builds a request after checking every parameter.
    pub fn new(frequencies: Vec<f32>, timbre: Timbre, duration_sec: f32, volume: f32) -> Result<Self> {
        if frequencies.is_empty() {
            return Err(ToneError::invalid("at least one frequency is required"));
        }
        if let Some(bad) = frequencies.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(ToneError::invalid(format!("frequency {bad} must be positive")));
        }
        if !duration_sec.is_finite() || duration_sec < 0.0 {
            return Err(ToneError::invalid(format!(
                "duration {duration_sec} must not be negative"
            )));
        }
        if !(0.0..=1.0).contains(&volume) {
            return Err(ToneError::invalid(format!("volume {volume} outside [0, 1]")));
        }
        timbre.validate()?;
        Ok(Self {
            frequencies,
            timbre,
            duration_sec,
            volume,
        })
    }

    /// Number of samples this request renders to at `sample_rate`.
    pub fn sample_count(&self, sample_rate: u32) -> usize {
        (self.duration_sec as f64 * sample_rate as f64).round() as usize
    }
}

/// ADSR segment boundaries resolved against a concrete duration, in seconds.
///
/// When the segments do not fit, release keeps priority and the attack and
/// decay are compressed into what remains; no segment goes negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain_level: f64,
    pub release_start: f64,
    pub release: f64,
}

impl Envelope {
    pub fn resolve(timbre: &Timbre, duration_sec: f32) -> Self {
        let duration = duration_sec.max(0.0) as f64;
        let release = (timbre.release_sec as f64).min(duration);
        let remaining = duration - release;
        let attack = (timbre.attack_sec as f64).min(remaining);
        let decay = (timbre.decay_sec as f64).min(remaining - attack);
        Self {
            attack,
            decay,
            sustain_level: timbre.sustain_level as f64,
            release_start: remaining,
            release,
        }
    }

    /// Envelope gain at time `t` seconds into the tone.
    pub fn level(&self, t: f64) -> f64 {
        if t < self.attack {
            t / self.attack
        } else if t < self.attack + self.decay {
            1.0 - (1.0 - self.sustain_level) * (t - self.attack) / self.decay
        } else if t < self.release_start {
            self.sustain_level
        } else if self.release > 0.0 {
            let progress = (t - self.release_start) / self.release;
            (self.sustain_level * (1.0 - progress)).max(0.0)
        } else {
            0.0
        }
    }
}

/// Streaming renderer yielding one float sample per call.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    request: ToneRequest,
    envelope: Envelope,
    sample_rate: f64,
    normalisation: f32,
    position: usize,
    total: usize,
}

impl ToneGenerator {
    pub fn new(request: ToneRequest, sample_rate: u32) -> Self {
        let envelope = Envelope::resolve(&request.timbre, request.duration_sec);
        let total = request.sample_count(sample_rate);
        let normalisation = (request.frequencies.len() * request.timbre.harmonics.len()) as f32;
        Self {
            request,
            envelope,
            sample_rate: sample_rate as f64,
            normalisation,
            position: 0,
            total,
        }
    }

    /// Total number of samples the generator will produce.
    pub fn total_samples(&self) -> usize {
        self.total
    }

    fn sample_at(&self, index: usize) -> f32 {
        let t = index as f64 / self.sample_rate;
        let timbre = &self.request.timbre;

        let mut mix = 0.0f32;
        for &frequency in &self.request.frequencies {
            for (k, &weight) in timbre.harmonics.iter().enumerate() {
                let cycles = frequency as f64 * (k + 1) as f64 * t;
                mix += weight * timbre.shape.sample(cycles);
            }
        }

        let shaped = mix / self.normalisation * self.envelope.level(t) as f32;
        (shaped * self.request.volume).clamp(-1.0, 1.0)
    }
}

impl Iterator for ToneGenerator {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.total {
            return None;
        }
        let sample = self.sample_at(self.position);
        self.position += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.position;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ToneGenerator {}

/// Signed 16-bit samples at [`SAMPLE_RATE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Vec<i16>,
}

impl SampleBuffer {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the buffer in seconds.
    pub fn duration_sec(&self) -> f32 {
        self.samples.len() as f32 / SAMPLE_RATE as f32
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// Maps a float sample in [-1, 1] onto the signed 16-bit range.
pub fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Renders a request to float samples at any sample rate.
pub fn render(request: &ToneRequest, sample_rate: u32) -> Vec<f32> {
    ToneGenerator::new(request.clone(), sample_rate).collect()
}

/// Synthesises a note or chord into a 16-bit buffer at 44.1 kHz.
///
/// # Arguments
/// * `frequencies` - One frequency for a note, several for a chord
/// * `timbre` - Shape, harmonics and envelope to render with
/// * `duration_sec` - Tone length; zero yields an empty buffer
/// * `volume` - Output gain in [0, 1]
///
/// # Returns
/// * `Ok(SampleBuffer)` - Exactly `round(duration_sec * 44100)` samples
/// * `Err(InvalidParameter)` - Non-positive frequency, negative duration or bad volume
pub fn synthesize(
    frequencies: &[f32],
    timbre: &Timbre,
    duration_sec: f32,
    volume: f32,
) -> Result<SampleBuffer> {
    let request = ToneRequest::new(frequencies.to_vec(), timbre.clone(), duration_sec, volume)?;
    Ok(synthesize_request(&request))
}

/// Synthesises an already validated request.
pub fn synthesize_request(request: &ToneRequest) -> SampleBuffer {
    let generator = ToneGenerator::new(request.clone(), SAMPLE_RATE);
    log::debug!(
        "[SYNTH] Rendering {} samples for {:?} Hz",
        generator.total_samples(),
        request.frequencies
    );
    SampleBuffer::new(generator.map(quantize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timbre::{WaveformShape, timbre_for};

    fn flat_timbre(shape: WaveformShape, harmonics: &[f32]) -> Timbre {
        Timbre {
            shape,
            harmonics: harmonics.to_vec(),
            attack_sec: 0.0,
            decay_sec: 0.0,
            sustain_level: 1.0,
            release_sec: 0.0,
        }
    }

    #[test]
    fn output_length_matches_duration() {
        let timbre = Timbre::sine();
        for duration in [0.0, 0.001, 0.01, 0.1234, 0.5, 1.0] {
            let buffer = synthesize(&[440.0], &timbre, duration, 0.8).unwrap();
            let expected = (duration as f64 * 44_100.0).round() as usize;
            assert_eq!(buffer.len(), expected, "duration {duration}");
        }
    }

    #[test]
    fn zero_duration_is_empty_not_an_error() {
        let buffer = synthesize(&[440.0], &Timbre::sine(), 0.0, 1.0).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn rejects_invalid_parameters() {
        let timbre = Timbre::sine();
        for result in [
            synthesize(&[0.0], &timbre, 1.0, 0.5),
            synthesize(&[-440.0], &timbre, 1.0, 0.5),
            synthesize(&[f32::NAN], &timbre, 1.0, 0.5),
            synthesize(&[], &timbre, 1.0, 0.5),
            synthesize(&[440.0], &timbre, -0.1, 0.5),
            synthesize(&[440.0], &timbre, 1.0, 1.5),
        ] {
            assert!(matches!(result, Err(ToneError::InvalidParameter(_))));
        }
    }

    #[test]
    fn synthesis_is_deterministic() {
        let timbre = timbre_for("violin").unwrap();
        let a = synthesize(&[220.0, 277.18, 329.63], timbre, 0.25, 0.7).unwrap();
        let b = synthesize(&[220.0, 277.18, 329.63], timbre, 0.25, 0.7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn chords_never_clip_for_any_size() {
        let organ = timbre_for("organ").unwrap();
        let frequencies = [261.63, 329.63, 392.0, 493.88];
        for size in 1..=frequencies.len() {
            let request =
                ToneRequest::new(frequencies[..size].to_vec(), organ.clone(), 0.3, 1.0).unwrap();
            let samples = render(&request, SAMPLE_RATE);
            assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        }
    }

    #[test]
    fn unshaped_square_is_not_clamped_by_normalisation() {
        let timbre = flat_timbre(WaveformShape::Square, &[1.0, 1.0]);
        let request = ToneRequest::new(vec![100.0, 150.0], timbre, 0.05, 1.0).unwrap();
        let samples = render(&request, SAMPLE_RATE);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 1.0);
        assert!(peak > 0.9, "peak {peak}");
    }

    #[test]
    fn volume_scales_output() {
        let timbre = flat_timbre(WaveformShape::Sine, &[1.0]);
        let loud = ToneRequest::new(vec![440.0], timbre.clone(), 0.01, 1.0).unwrap();
        let quiet = ToneRequest::new(vec![440.0], timbre, 0.01, 0.5).unwrap();
        for (l, q) in render(&loud, SAMPLE_RATE).iter().zip(render(&quiet, SAMPLE_RATE)) {
            assert!((l * 0.5 - q).abs() < 1e-6);
        }
    }

    #[test]
    fn silent_volume_yields_zero_samples() {
        let buffer = synthesize(&[440.0], &Timbre::sine(), 0.1, 0.0).unwrap();
        assert!(buffer.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn envelope_follows_adsr_shape() {
        let timbre = Timbre {
            shape: WaveformShape::Sine,
            harmonics: vec![1.0],
            attack_sec: 0.1,
            decay_sec: 0.2,
            sustain_level: 0.5,
            release_sec: 0.3,
        };
        let env = Envelope::resolve(&timbre, 1.0);
        assert_eq!(env.level(0.0), 0.0);
        assert!((env.level(0.05) - 0.5).abs() < 1e-6);
        assert!((env.level(0.1) - 1.0).abs() < 1e-6);
        assert!((env.level(0.2) - 0.75).abs() < 1e-6);
        assert!((env.level(0.5) - 0.5).abs() < 1e-6);
        assert!((env.level(0.85) - 0.25).abs() < 1e-6);
        assert!(env.level(1.0).abs() < 1e-6);
    }

    #[test]
    fn release_takes_priority_on_short_tones() {
        let timbre = Timbre {
            shape: WaveformShape::Sine,
            harmonics: vec![1.0],
            attack_sec: 0.1,
            decay_sec: 0.1,
            sustain_level: 0.6,
            release_sec: 0.3,
        };

        let env = Envelope::resolve(&timbre, 0.35);
        assert!((env.release - 0.3).abs() < 1e-6);
        assert!((env.attack - 0.05).abs() < 1e-6);
        assert_eq!(env.decay, 0.0);

        let env = Envelope::resolve(&timbre, 0.2);
        assert!((env.release - 0.2).abs() < 1e-6);
        assert_eq!(env.attack, 0.0);
        assert_eq!(env.decay, 0.0);
        assert_eq!(env.release_start, 0.0);

        let env = Envelope::resolve(&timbre, 0.0);
        assert_eq!(env.release, 0.0);
        assert_eq!(env.level(0.0), 0.0);
    }

    #[test]
    fn segments_fit_inside_duration() {
        for id in crate::timbre::instrument_ids() {
            let timbre = timbre_for(id).unwrap();
            for duration in [0.0, 0.05, 0.3, 1.0, 2.5] {
                let env = Envelope::resolve(timbre, duration);
                assert!(env.attack >= 0.0 && env.decay >= 0.0 && env.release >= 0.0);
                let total = env.attack + env.decay + env.release;
                assert!(total <= duration as f64 + 1e-9, "{id} at {duration}");
                assert!((env.release_start + env.release - duration as f64).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn tone_fades_out_at_the_end() {
        let buffer = synthesize(&[440.0], timbre_for("piano").unwrap(), 1.0, 1.0).unwrap();
        let tail = &buffer.samples()[buffer.len() - 20..];
        assert!(tail.iter().all(|s| s.abs() < 200), "tail {tail:?}");
        assert_eq!(buffer.samples()[0], 0);
    }

    #[test]
    fn generator_matches_buffer() {
        let request = ToneRequest::new(vec![330.0], Timbre::sine(), 0.05, 0.8).unwrap();
        let generator = ToneGenerator::new(request.clone(), SAMPLE_RATE);
        assert_eq!(generator.len(), request.sample_count(SAMPLE_RATE));
        let from_generator: Vec<i16> = generator.map(quantize).collect();
        assert_eq!(from_generator, synthesize_request(&request).into_samples());
    }

    #[test]
    fn quantize_is_symmetric_and_clamped() {
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32767);
        assert_eq!(quantize(2.0), 32767);
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(0.5), 16384);
    }
}
