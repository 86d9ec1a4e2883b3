//! # Tone Engine Module
//!
//! The explicit context behind the playback contract. A [`ToneEngine`] owns the
//! current settings, the chosen [`PlaybackAdapter`] and the in-flight flag that
//! enforces at most one tone at a time. Separate engines share nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use crossbeam_channel::Sender;

use crate::config::{EngineSettings, clamp_volume};
use crate::error::{Result, ToneError};
use crate::notes::{ChordType, Note, PitchClass, chord_notes};
use crate::playback::{PlaybackAdapter, PlaybackOutcome};
use crate::synth::ToneRequest;
use crate::timbre::timbre_for;

/// Octave of the root when a chord is requested without one.
pub const CHORD_OCTAVE: i32 = 4;

/// Plays tones through one adapter, one tone at a time.
pub struct ToneEngine {
    adapter: Box<dyn PlaybackAdapter>,
    settings: RwLock<EngineSettings>,
    in_flight: AtomicBool,
    stop_tx: Mutex<Option<Sender<()>>>,
}

/// Releases the in-flight flag when the play call ends, including on panic.
struct InFlight<'a> {
    engine: &'a ToneEngine,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.engine
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.engine.in_flight.store(false, Ordering::Release);
    }
}

impl ToneEngine {
    pub fn new(adapter: Box<dyn PlaybackAdapter>) -> Self {
        Self::with_settings(adapter, EngineSettings::default())
    }

    /// Builds an engine with initial settings; the volume is clamped to [0, 1].
    pub fn with_settings(adapter: Box<dyn PlaybackAdapter>, settings: EngineSettings) -> Self {
        Self {
            adapter,
            settings: RwLock::new(settings.clamped()),
            in_flight: AtomicBool::new(false),
            stop_tx: Mutex::new(None),
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> EngineSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sets the output volume, clamped to [0, 1].
    pub fn set_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .volume = volume;
    }

    /// Switches the default instrument. Unknown ids are rejected.
    pub fn set_instrument(&self, instrument_id: &str) -> Result<()> {
        timbre_for(instrument_id)?;
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .instrument = instrument_id.to_string();
        Ok(())
    }

    /// True while a tone is in flight.
    pub fn is_playing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Plays one or more notes together and returns once they finish.
    ///
    /// # Arguments
    /// * `notes` - Notes to sound at once (one for a note, several for a chord)
    /// * `instrument` - Instrument id, or `None` for the configured default
    /// * `duration_sec` - Tone length in seconds
    ///
    /// # Returns
    /// * `Ok(outcome)` - Completed, stopped, or failed on the platform side
    /// * `Err(PlaybackBusy)` - Another tone is in flight; nothing was played
    /// * `Err(InvalidParameter)` - Bad notes, instrument or duration
    pub fn play_tone(
        &self,
        notes: &[Note],
        instrument: Option<&str>,
        duration_sec: f32,
    ) -> Result<PlaybackOutcome> {
        if notes.is_empty() {
            return Err(ToneError::invalid("at least one note is required"));
        }
        let frequencies: Vec<f32> = notes.iter().map(|n| n.frequency()).collect();
        self.play_frequencies(&frequencies, instrument, duration_sec)
    }

    /// Plays a chord built on `root` in octave [`CHORD_OCTAVE`].
    pub fn play_chord(
        &self,
        root: PitchClass,
        chord_type: ChordType,
        instrument: Option<&str>,
        duration_sec: f32,
    ) -> Result<PlaybackOutcome> {
        let notes = chord_notes(root, CHORD_OCTAVE, chord_type);
        self.play_tone(&notes, instrument, duration_sec)
    }

    /// Plays raw frequencies with the given (or default) instrument.
    pub fn play_frequencies(
        &self,
        frequencies: &[f32],
        instrument: Option<&str>,
        duration_sec: f32,
    ) -> Result<PlaybackOutcome> {
        let request = self.build_request(frequencies, instrument, duration_sec)?;

        let _guard = self.claim()?;
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        *self.stop_tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(stop_tx);

        log::info!(
            "[ENGINE] Playing {:?} Hz for {:.2}s via {}",
            request.frequencies,
            request.duration_sec,
            self.adapter.name()
        );
        match self.adapter.play(&request, &stop_rx) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::warn!("[ENGINE] Playback failed, continuing without sound: {}", e);
                Ok(PlaybackOutcome::Failed)
            }
        }
    }

    /// Stops the tone in flight, if any. Returns whether one was signalled.
    pub fn stop(&self) -> bool {
        match self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(tx) => tx.try_send(()).is_ok(),
            None => false,
        }
    }

    fn build_request(
        &self,
        frequencies: &[f32],
        instrument: Option<&str>,
        duration_sec: f32,
    ) -> Result<ToneRequest> {
        let settings = self.settings();
        let instrument = instrument.unwrap_or(&settings.instrument);
        let timbre = timbre_for(instrument)?;
        ToneRequest::new(
            frequencies.to_vec(),
            timbre.clone(),
            duration_sec,
            settings.volume,
        )
    }

    fn claim(&self) -> Result<InFlight<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("[ENGINE] Rejecting tone, one is already playing");
            return Err(ToneError::PlaybackBusy);
        }
        Ok(InFlight { engine: self })
    }
}
