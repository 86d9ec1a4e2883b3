//! # Musical Tuning Module
//!
//! Converts detected frequencies into musical readings: nearest note name,
//! octave, cent deviation and a tuning-accuracy confidence.
//!
//! ## Features
//! - Equal temperament mapping anchored at A4 = 440 Hz
//! - Exact round trip with the frequency table in [`crate::notes`]
//! - Cent deviation calculations for tuning accuracy
//! - Averaging of a rolling history of readings

use serde::{Deserialize, Serialize};

use crate::notes::{A_INDEX, A4_FREQUENCY, Note, PitchClass, REFERENCE_OCTAVE};

/// Lowest frequency the mapper reports on.
pub const MIN_FREQUENCY: f32 = 60.0;

/// Highest frequency the mapper reports on.
pub const MAX_FREQUENCY: f32 = 1500.0;

/// A single tuning reading produced for one analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchReading {
    /// Measured frequency in Hz.
    pub frequency_hz: f32,
    /// Nearest pitch class.
    pub note: PitchClass,
    pub octave: i32,
    /// Deviation from the nearest note in cents, -50 to 50.
    pub cents_offset: i32,
    /// 1.0 when in tune, decaying to 0.0 at the midpoint between notes.
    pub confidence: f32,
}

impl PitchReading {
    /// Note name with octave, e.g. "A#4".
    pub fn note_name(&self) -> String {
        Note::new(self.note, self.octave).to_string()
    }
}

/// Maps a frequency to its nearest equal-tempered note.
///
/// # Arguments
/// * `frequency` - Frequency in Hz
///
/// # Returns
/// * `Some(PitchReading)` - Note, octave, cents and confidence
/// * `None` - The frequency is outside the supported range
pub fn map_to_note(frequency: f32) -> Option<PitchReading> {
    if !frequency.is_finite() || !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&frequency) {
        return None;
    }

    let semitones_from_a4 = 12.0 * (frequency as f64 / A4_FREQUENCY as f64).log2();
    let nearest = semitones_from_a4.round() as i32;
    let cents = ((semitones_from_a4 - nearest as f64) * 100.0).round() as i32;

    let note = PitchClass::from_index(nearest + A_INDEX);
    let octave = (nearest + A_INDEX).div_euclid(12) + REFERENCE_OCTAVE;
    let confidence = (1.0 - cents.abs() as f32 / 50.0).clamp(0.0, 1.0);

    Some(PitchReading {
        frequency_hz: frequency,
        note,
        octave,
        cents_offset: cents,
        confidence,
    })
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values are flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Averages the frequencies of a set of readings and remaps the mean.
///
/// Returns `None` for an empty history or a mean outside the mapper's range.
pub fn average_reading<'a>(readings: impl IntoIterator<Item = &'a PitchReading>) -> Option<PitchReading> {
    let (sum, count) = readings
        .into_iter()
        .fold((0.0f64, 0usize), |(sum, count), r| (sum + r.frequency_hz as f64, count + 1));
    if count == 0 {
        return None;
    }
    map_to_note((sum / count as f64) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::frequency;

    #[test]
    fn a440_is_a4_in_tune() {
        let reading = map_to_note(440.0).unwrap();
        assert_eq!(reading.note, PitchClass::A);
        assert_eq!(reading.octave, 4);
        assert_eq!(reading.cents_offset, 0);
        assert_eq!(reading.confidence, 1.0);
        assert_eq!(reading.note_name(), "A4");
    }

    #[test]
    fn a_sharp_four() {
        let reading = map_to_note(466.16).unwrap();
        assert_eq!(reading.note, PitchClass::ASharp);
        assert_eq!(reading.octave, 4);
        assert_eq!(reading.cents_offset, 0);
    }

    #[test]
    fn table_frequencies_round_trip() {
        let mut checked = 0;
        for octave in 0..9 {
            for pc in PitchClass::ALL {
                let f = frequency(pc, octave);
                if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&f) {
                    continue;
                }
                let reading = map_to_note(f).unwrap();
                assert_eq!((reading.note, reading.octave, reading.cents_offset), (pc, octave, 0));
                checked += 1;
            }
        }
        assert!(checked > 40);
    }

    #[test]
    fn serialized_reading_carries_the_note_name() {
        let reading = map_to_note(466.16).unwrap();
        let json = serde_json::to_value(reading).unwrap();
        assert_eq!(json["note"], "A#");
        assert_eq!(json["octave"], 4);
        assert_eq!(json["cents_offset"], 0);

        let back: PitchReading = serde_json::from_value(json).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn octave_changes_at_c() {
        assert_eq!(map_to_note(frequency(PitchClass::B, 3)).unwrap().octave, 3);
        assert_eq!(map_to_note(frequency(PitchClass::C, 4)).unwrap().octave, 4);
        let low = map_to_note(frequency(PitchClass::C, 2)).unwrap();
        assert_eq!((low.note, low.octave), (PitchClass::C, 2));
    }

    #[test]
    fn cents_and_confidence() {
        let sharp = map_to_note(440.0 * 2f32.powf(20.0 / 1200.0)).unwrap();
        assert_eq!(sharp.note, PitchClass::A);
        assert_eq!(sharp.cents_offset, 20);
        assert!((sharp.confidence - 0.6).abs() < 1e-6);

        let flat = map_to_note(440.0 * 2f32.powf(-45.0 / 1200.0)).unwrap();
        assert_eq!(flat.cents_offset, -45);
        assert!((flat.confidence - 0.1).abs() < 1e-6);
    }

    #[test]
    fn cents_stay_within_half_a_semitone() {
        let mut f = MIN_FREQUENCY;
        while f <= MAX_FREQUENCY {
            let reading = map_to_note(f).unwrap();
            assert!((-50..=50).contains(&reading.cents_offset), "{f} -> {reading:?}");
            assert!((0.0..=1.0).contains(&reading.confidence));
            f *= 1.003;
        }
    }

    #[test]
    fn out_of_range_is_none() {
        assert_eq!(map_to_note(30.0), None);
        assert_eq!(map_to_note(2000.0), None);
        assert_eq!(map_to_note(0.0), None);
        assert_eq!(map_to_note(-440.0), None);
        assert_eq!(map_to_note(f32::NAN), None);
    }

    #[test]
    fn cents_deviation() {
        assert!((calculate_cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!(calculate_cents_deviation(440.0, 440.0).abs() < 1e-6);
    }

    #[test]
    fn average_of_readings() {
        let readings: Vec<_> = [438.0, 440.0, 442.0]
            .into_iter()
            .filter_map(map_to_note)
            .collect();
        let average = average_reading(&readings).unwrap();
        assert!((average.frequency_hz - 440.0).abs() < 1e-3);
        assert_eq!(average.note, PitchClass::A);
        assert_eq!(average_reading(std::iter::empty::<&PitchReading>()), None);
    }
}
