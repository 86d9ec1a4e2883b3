//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a captured window using
//! normalised autocorrelation. It is the real analysis contract behind the
//! pitch session: any genuine input buffer can be fed to it unchanged.
//!
//! ## Features
//! - RMS noise gate to reject silence
//! - Normalised cross-correlation over a bounded period range
//! - Octave error prevention by preferring the first strong peak
//! - Parabolic interpolation for sub-sample accuracy

use serde::{Deserialize, Serialize};

/// Peaks within this distance of the global best are treated as equally strong,
/// so the shortest period among them wins.
const OCTAVE_TOLERANCE: f32 = 0.05;

/// Keeps the correlation denominator away from zero.
const EPSILON: f32 = 1e-9;

/// Tunable limits of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Lowest detectable frequency in Hz.
    pub min_frequency: f32,
    /// Highest detectable frequency in Hz.
    pub max_frequency: f32,
    /// Windows with an RMS below this are treated as silence.
    pub silence_threshold: f32,
    /// Minimum normalised correlation for a period to count as a pitch.
    pub confidence_floor: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_frequency: 60.0,
            max_frequency: 1500.0,
            silence_threshold: 0.01,
            confidence_floor: 0.8,
        }
    }
}

/// A detected fundamental together with how periodic the window was.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Detected frequency in Hz.
    pub frequency: f32,
    /// Normalised correlation at the chosen period (0.0 to 1.0).
    pub clarity: f32,
}

/// Autocorrelation pitch estimator. Stateless; every call is independent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PitchEstimator {
    config: EstimatorConfig,
}

impl PitchEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimates the fundamental frequency of a window.
    ///
    /// # Arguments
    /// * `signal` - Input audio window
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Some(frequency)` - Detected frequency in Hz
    /// * `None` - No pitch (silence, noise or a window too short to search)
    pub fn estimate(&self, signal: &[f32], sample_rate: u32) -> Option<f32> {
        self.analyze(signal, sample_rate).map(|p| p.frequency)
    }

    /// Same as [`estimate`](Self::estimate) but also reports the clarity.
    pub fn analyze(&self, signal: &[f32], sample_rate: u32) -> Option<PitchEstimate> {
        let frame_size = signal.len();
        if frame_size < 2 || sample_rate == 0 {
            return None;
        }

        // --- Noise Gate: Calculate RMS to filter out silence ---
        let rms = (signal.iter().map(|&s| s * s).sum::<f32>() / frame_size as f32).sqrt();
        if !rms.is_finite() || rms < self.config.silence_threshold {
            return None;
        }

        // --- Candidate periods, capped at half the window ---
        let rate = sample_rate as f32;
        let min_period = ((rate / self.config.max_frequency).floor() as usize).max(1);
        let max_period = ((rate / self.config.min_frequency).floor() as usize).min(frame_size / 2);
        if max_period < min_period {
            return None;
        }

        // One extra lag on each side so the chosen peak can be interpolated.
        let first_lag = (min_period - 1).max(1);
        let last_lag = (max_period + 1).min(frame_size - 1);
        let correlations: Vec<f32> = (first_lag..=last_lag)
            .map(|lag| normalized_correlation(signal, lag))
            .collect();
        let corr = |lag: usize| correlations[lag - first_lag];

        let best = (min_period..=max_period)
            .map(corr)
            .fold(f32::NEG_INFINITY, f32::max);
        if best < self.config.confidence_floor {
            return None;
        }

        // --- Octave guard: take the first local peak that is nearly as strong ---
        let is_peak = |lag: usize| {
            let c = corr(lag);
            let left_ok = lag <= first_lag || c >= corr(lag - 1);
            let right_ok = lag >= last_lag || c >= corr(lag + 1);
            c >= best - OCTAVE_TOLERANCE && left_ok && right_ok
        };
        let period = (min_period..=max_period)
            .find(|&lag| is_peak(lag))
            .or_else(|| (min_period..=max_period).find(|&lag| corr(lag) == best))?;

        // --- Parabolic interpolation for better precision ---
        let refined = if period > first_lag && period < last_lag {
            let y1 = corr(period - 1);
            let y2 = corr(period);
            let y3 = corr(period + 1);
            let denominator = y1 - 2.0 * y2 + y3;
            if denominator.abs() > f32::EPSILON {
                let shift = 0.5 * (y1 - y3) / denominator;
                period as f32 + shift.clamp(-0.5, 0.5)
            } else {
                period as f32
            }
        } else {
            period as f32
        };

        let frequency = rate / refined;
        if frequency.is_finite() && frequency > 0.0 {
            Some(PitchEstimate {
                frequency,
                clarity: corr(period).clamp(0.0, 1.0),
            })
        } else {
            None
        }
    }
}

/// Normalised cross-correlation between the window and itself shifted by `lag`,
/// computed over the overlapping region only.
fn normalized_correlation(signal: &[f32], lag: usize) -> f32 {
    let head = &signal[..signal.len() - lag];
    let tail = &signal[lag..];

    let mut cross = 0.0f32;
    let mut energy_head = 0.0f32;
    let mut energy_tail = 0.0f32;
    for (&a, &b) in head.iter().zip(tail) {
        cross += a * b;
        energy_head += a * a;
        energy_tail += b * b;
    }
    cross / (energy_head * energy_tail + EPSILON).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{SAMPLE_RATE, ToneRequest, render};
    use crate::timbre::timbre_for;
    use std::f32::consts::PI;

    fn sine(frequency: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn assert_close(detected: f32, expected: f32) {
        let error = (detected - expected).abs() / expected;
        assert!(error < 0.01, "expected {expected} Hz, detected {detected} Hz");
    }

    #[test]
    fn silence_has_no_pitch() {
        let estimator = PitchEstimator::default();
        for len in [0, 1, 2, 100, 2048, 8192] {
            assert_eq!(estimator.estimate(&vec![0.0; len], SAMPLE_RATE), None);
        }
    }

    #[test]
    fn recovers_a_pure_sine() {
        let estimator = PitchEstimator::default();
        let estimate = estimator.analyze(&sine(440.0, 0.8, 2048), SAMPLE_RATE).unwrap();
        assert_close(estimate.frequency, 440.0);
        assert!(estimate.clarity >= estimator.config().confidence_floor);
    }

    #[test]
    fn recovers_sines_across_the_range() {
        let estimator = PitchEstimator::default();
        for frequency in [65.0, 82.4, 110.0, 196.0, 261.63, 523.25, 880.0, 1046.5, 1400.0] {
            let detected = estimator
                .estimate(&sine(frequency, 0.5, 4096), SAMPLE_RATE)
                .unwrap_or_else(|| panic!("no pitch for {frequency}"));
            assert_close(detected, frequency);
        }
    }

    #[test]
    fn rich_timbres_do_not_jump_octaves() {
        let estimator = PitchEstimator::default();
        for id in ["piano", "violin", "guitar", "organ"] {
            let request =
                ToneRequest::new(vec![220.0], timbre_for(id).unwrap().clone(), 0.5, 0.8).unwrap();
            let samples = render(&request, SAMPLE_RATE);
            let window = &samples[8192..8192 + 2048];
            let detected = estimator
                .estimate(window, SAMPLE_RATE)
                .unwrap_or_else(|| panic!("no pitch for {id}"));
            assert_close(detected, 220.0);
        }
    }

    #[test]
    fn quiet_signal_is_gated() {
        let estimator = PitchEstimator::default();
        assert_eq!(estimator.estimate(&sine(440.0, 0.005, 2048), SAMPLE_RATE), None);
    }

    #[test]
    fn white_noise_is_rejected() {
        let mut state = 0x2545_f491_u32;
        let noise: Vec<f32> = (0..2048)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as f32 / u32::MAX as f32 * 2.0 - 1.0
            })
            .collect();
        assert_eq!(PitchEstimator::default().estimate(&noise, SAMPLE_RATE), None);
    }

    #[test]
    fn short_window_is_rejected() {
        let estimator = PitchEstimator::default();
        assert_eq!(estimator.estimate(&sine(1000.0, 0.8, 40), SAMPLE_RATE), None);
    }

    #[test]
    fn custom_range_limits_search() {
        let estimator = PitchEstimator::new(EstimatorConfig {
            min_frequency: 300.0,
            max_frequency: 1500.0,
            ..EstimatorConfig::default()
        });
        let detected = estimator.estimate(&sine(600.0, 0.8, 2048), SAMPLE_RATE).unwrap();
        assert_close(detected, 600.0);
    }
}
