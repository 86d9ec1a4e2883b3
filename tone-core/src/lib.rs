// tone-core/src/lib.rs

//! The core of the tone toolkit.
//! This crate synthesises instrument tones, encodes them as WAV, plays them
//! through the system output and estimates the pitch of captured audio.
//! It is headless and contains no user-interface code.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod notes;
pub mod pitch;
pub mod playback;
pub mod session;
pub mod spectrum;
pub mod synth;
pub mod timbre;
pub mod tuning;
pub mod wav;

pub use config::{EngineSettings, SessionConfig};
pub use engine::ToneEngine;
pub use error::{Result, ToneError};
pub use notes::{ChordType, Note, PitchClass};
pub use pitch::{EstimatorConfig, PitchEstimator};
pub use playback::{PlaybackAdapter, PlaybackKind, PlaybackOutcome, select_adapter};
pub use session::PitchSession;
pub use synth::{SAMPLE_RATE, SampleBuffer, ToneRequest, synthesize};
pub use timbre::{Timbre, timbre_for};
pub use tuning::{PitchReading, map_to_note};
