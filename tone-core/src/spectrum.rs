//! # Spectrum Module
//!
//! FFT magnitude spectra for cross-checking tones: the CLI `analyze` command
//! reports the strongest spectral peak next to the autocorrelation estimate,
//! and the synthesiser tests use it to confirm where a tone's energy sits.
//!
//! ## Features
//! - DC offset removal and Hann windowing before the transform
//! - Forward FFT using RustFFT
//! - Peak picking with log-parabolic interpolation for sub-bin accuracy

use rustfft::{FftPlanner, num_complex::Complex};

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to taper the buffer to zero at its edges.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Computes the magnitude spectrum of a window.
///
/// # Returns
/// * The first `signal.len() / 2` bin magnitudes (up to Nyquist); empty for an empty signal
pub fn magnitude_spectrum(signal: &[f32]) -> Vec<f32> {
    if signal.is_empty() {
        return Vec::new();
    }

    let mut processed = signal.to_vec();
    remove_dc_offset(&mut processed);
    apply_hann_window(&mut processed);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(processed.len());

    let mut buffer: Vec<Complex<f32>> = processed
        .into_iter()
        .map(|sample| Complex { re: sample, im: 0.0 })
        .collect();
    fft.process(&mut buffer);

    buffer
        .iter()
        .take(signal.len() / 2)
        .map(|c| c.norm())
        .collect()
}

/// Finds the frequency of the strongest bin in a magnitude spectrum.
///
/// # Arguments
/// * `magnitudes` - Output of [`magnitude_spectrum`]
/// * `sample_rate` - Sample rate of the analysed window in Hz
///
/// # Returns
/// * `Some(frequency)` - Peak frequency, refined between neighbouring bins
/// * `None` - Empty or silent spectrum
pub fn peak_frequency(magnitudes: &[f32], sample_rate: u32) -> Option<f32> {
    let buffer_size = magnitudes.len() * 2;
    let (peak_bin, &peak) = magnitudes
        .iter()
        .enumerate()
        .skip(1) // DC
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    if peak <= 0.0 {
        return None;
    }

    let bin_to_hz = |bin: f32| bin * sample_rate as f32 / buffer_size as f32;
    if peak_bin + 1 >= magnitudes.len() {
        return Some(bin_to_hz(peak_bin as f32));
    }

    let y1 = magnitudes[peak_bin - 1].ln();
    let y2 = magnitudes[peak_bin].ln();
    let y3 = magnitudes[peak_bin + 1].ln();
    if !y1.is_finite() || !y3.is_finite() {
        return Some(bin_to_hz(peak_bin as f32));
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 {
        return Some(bin_to_hz(peak_bin as f32));
    }
    let peak_shift = (y3 - y1) / (2.0 * denominator);
    Some(bin_to_hz(peak_bin as f32 + peak_shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{SAMPLE_RATE, ToneRequest, render};
    use crate::timbre::{Timbre, WaveformShape};

    #[test]
    fn spectrum_length_is_half_the_window() {
        assert_eq!(magnitude_spectrum(&vec![0.1; 2048]).len(), 1024);
        assert!(magnitude_spectrum(&[]).is_empty());
    }

    #[test]
    fn silence_has_no_peak() {
        let magnitudes = magnitude_spectrum(&vec![0.0; 1024]);
        assert_eq!(peak_frequency(&magnitudes, SAMPLE_RATE), None);
    }

    #[test]
    fn synthesized_sine_peaks_at_its_frequency() {
        let request = ToneRequest::new(vec![440.0], Timbre::sine(), 0.5, 0.8).unwrap();
        let samples = render(&request, SAMPLE_RATE);
        let magnitudes = magnitude_spectrum(&samples[4096..4096 + 4096]);
        let peak = peak_frequency(&magnitudes, SAMPLE_RATE).unwrap();
        assert!((peak - 440.0).abs() < 5.0, "peak at {peak}");
    }

    #[test]
    fn harmonic_weights_shape_the_spectrum() {
        let timbre = Timbre {
            shape: WaveformShape::Sine,
            harmonics: vec![0.2, 1.0],
            attack_sec: 0.0,
            decay_sec: 0.0,
            sustain_level: 1.0,
            release_sec: 0.0,
        };
        let request = ToneRequest::new(vec![300.0], timbre, 0.2, 1.0).unwrap();
        let samples = render(&request, SAMPLE_RATE);
        let magnitudes = magnitude_spectrum(&samples[..4096]);
        let peak = peak_frequency(&magnitudes, SAMPLE_RATE).unwrap();
        assert!((peak - 600.0).abs() < 6.0, "peak at {peak}");
    }
}
