//! # Instrument Timbre Module
//!
//! A fixed registry mapping instrument ids to their timbre: waveform shape,
//! harmonic amplitude series and ADSR timing. The registry is built once and
//! never mutated; switching instrument only changes which entry later calls read.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::error::{Result, ToneError};

/// Instrument used when nothing else is configured.
pub const DEFAULT_INSTRUMENT: &str = "piano";

/// Base periodic shape of every harmonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformShape {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl WaveformShape {
    /// Value of the shape for a given number of elapsed cycles (`frequency * t`).
    pub fn sample(self, cycles: f64) -> f32 {
        match self {
            WaveformShape::Sine => (2.0 * PI * cycles).sin() as f32,
            WaveformShape::Square => {
                let s = (2.0 * PI * cycles).sin();
                if s > 0.0 {
                    1.0
                } else if s < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            WaveformShape::Sawtooth => (2.0 * cycles.fract() - 1.0) as f32,
            WaveformShape::Triangle => (4.0 * (cycles.fract() - 0.5).abs() - 1.0) as f32,
        }
    }
}

/// Immutable description of how an instrument sounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timbre {
    pub shape: WaveformShape,
    /// Amplitude multipliers for overtones 1..N. Never empty.
    pub harmonics: Vec<f32>,
    pub attack_sec: f32,
    pub decay_sec: f32,
    /// Sustain level in [0, 1].
    pub sustain_level: f32,
    pub release_sec: f32,
}

impl Timbre {
    /// Checks the invariants every registered or caller-built timbre must hold.
    pub fn validate(&self) -> Result<()> {
        if self.harmonics.is_empty() {
            return Err(ToneError::invalid("timbre needs at least one harmonic"));
        }
        if !(0.0..=1.0).contains(&self.sustain_level) {
            return Err(ToneError::invalid(format!(
                "sustain level {} outside [0, 1]",
                self.sustain_level
            )));
        }
        for (name, value) in [
            ("attack", self.attack_sec),
            ("decay", self.decay_sec),
            ("release", self.release_sec),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ToneError::invalid(format!("{name} time {value} is negative")));
            }
        }
        Ok(())
    }

    /// A plain sine with a short, transparent envelope.
    pub fn sine() -> Self {
        Self {
            shape: WaveformShape::Sine,
            harmonics: vec![1.0],
            attack_sec: 0.01,
            decay_sec: 0.05,
            sustain_level: 0.9,
            release_sec: 0.05,
        }
    }
}

fn timbre(
    shape: WaveformShape,
    harmonics: &[f32],
    attack_sec: f32,
    decay_sec: f32,
    sustain_level: f32,
    release_sec: f32,
) -> Timbre {
    Timbre {
        shape,
        harmonics: harmonics.to_vec(),
        attack_sec,
        decay_sec,
        sustain_level,
        release_sec,
    }
}

/// The instrument registry, keyed by instrument id.
static INSTRUMENTS: Lazy<BTreeMap<&'static str, Timbre>> = Lazy::new(|| {
    use WaveformShape::*;
    BTreeMap::from([
        ("sine", Timbre::sine()),
        ("piano", timbre(Sine, &[1.0, 0.5, 0.25, 0.125, 0.06], 0.01, 0.3, 0.4, 0.5)),
        ("guitar", timbre(Triangle, &[1.0, 0.6, 0.3, 0.15, 0.08], 0.005, 0.2, 0.3, 0.4)),
        ("organ", timbre(Sine, &[1.0, 0.8, 0.6, 0.4, 0.3, 0.2], 0.05, 0.05, 0.9, 0.1)),
        ("flute", timbre(Sine, &[1.0, 0.1, 0.05], 0.1, 0.1, 0.8, 0.2)),
        ("violin", timbre(Sawtooth, &[1.0, 0.5, 0.33, 0.25], 0.15, 0.1, 0.85, 0.25)),
        ("synth", timbre(Square, &[1.0, 0.3], 0.02, 0.1, 0.7, 0.2)),
    ])
});

/// Looks up the timbre registered for an instrument id.
///
/// # Returns
/// * `Ok(&Timbre)` - The static timbre for the instrument
/// * `Err(InvalidParameter)` - The id is not registered
pub fn timbre_for(instrument_id: &str) -> Result<&'static Timbre> {
    INSTRUMENTS
        .get(instrument_id)
        .ok_or_else(|| ToneError::invalid(format!("unknown instrument '{instrument_id}'")))
}

/// All registered instrument ids in sorted order.
pub fn instrument_ids() -> impl Iterator<Item = &'static str> {
    INSTRUMENTS.keys().copied()
}
