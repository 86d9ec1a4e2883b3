//! Settings read by the engine and the pitch session.
//!
//! These are plain serde structs; the owner of a settings file decides how and
//! where they are stored.

use serde::{Deserialize, Serialize};

use crate::audio::BUFFER_SIZE;
use crate::pitch::EstimatorConfig;
use crate::timbre::DEFAULT_INSTRUMENT;

/// Process-wide playback settings, read at every play call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Output gain in [0, 1].
    pub volume: f32,
    /// Instrument used when a play call does not name one.
    pub instrument: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            volume: 0.8,
            instrument: DEFAULT_INSTRUMENT.to_string(),
        }
    }
}

impl EngineSettings {
    /// Returns the settings with the volume forced into [0, 1].
    ///
    /// Non-finite volumes become silence.
    pub fn clamped(mut self) -> Self {
        self.volume = clamp_volume(self.volume);
        self
    }
}

pub(crate) fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 }
}

/// Tuning of a listening session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of most recent samples analysed on each tick.
    pub window_size: usize,
    /// How often the estimator runs, in milliseconds.
    pub analysis_interval_ms: u64,
    /// Number of readings kept for averaging.
    pub history_len: usize,
    pub estimator: EstimatorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: BUFFER_SIZE,
            analysis_interval_ms: 150,
            history_len: 10,
            estimator: EstimatorConfig::default(),
        }
    }
}
