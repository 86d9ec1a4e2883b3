//! # Pitch Session Module
//!
//! Brackets a listening session. While active, a worker thread keeps a sliding
//! window of captured samples, runs the estimator on a timer, maps each pitch
//! to a note and emits the reading. The last few readings are kept for
//! averaging; that history belongs to the session, not to the estimator.
//!
//! ## Architecture
//! - **Capture**: CPAL input stream (or any frame channel) feeding raw frames
//! - **Worker**: `select!` over frames, the analysis tick and a shutdown signal
//! - **Output**: bounded channel of [`PitchReading`] events plus a rolling history

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::anyhow;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};

use crate::audio;
use crate::config::SessionConfig;
use crate::pitch::PitchEstimator;
use crate::tuning::{PitchReading, average_reading, map_to_note};

/// Readings buffered for a slow consumer before new ones are dropped.
const READING_QUEUE: usize = 64;

/// Captured frames buffered ahead of the analysis loop before new ones are dropped.
const CAPTURE_QUEUE: usize = 32;

type History = Arc<Mutex<VecDeque<PitchReading>>>;

/// A running listening session. Dropping it stops listening.
pub struct PitchSession {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
    readings_rx: Receiver<PitchReading>,
    history: History,
}

/// Everything the worker thread needs, moved into it at spawn time.
struct Worker {
    config: SessionConfig,
    estimator: PitchEstimator,
    shutdown_rx: Receiver<()>,
    readings_tx: Sender<PitchReading>,
    history: History,
}

impl PitchSession {
    /// Starts listening on the default input device.
    ///
    /// Returns once the capture stream is running, or with the device error.
    pub fn start_listening(config: SessionConfig) -> anyhow::Result<Self> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<anyhow::Result<()>>(1);
        let (session, worker) = Self::prepare(config);

        let thread_handle = thread::spawn(move || {
            log::info!("[SESSION] Starting capture thread...");
            let (raw_audio_tx, raw_audio_rx) = crossbeam_channel::bounded::<Vec<f32>>(CAPTURE_QUEUE);
            let (stream, sample_rate) = match audio::start_audio_capture(raw_audio_tx) {
                Ok(tuple) => {
                    let _ = ready_tx.send(Ok(()));
                    tuple
                }
                Err(e) => {
                    log::error!("[SESSION] Error starting audio capture: {:#}", e);
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            worker.run(raw_audio_rx, sample_rate);

            log::info!("[SESSION] Stopping capture stream...");
            if let Err(e) = stream.pause() {
                log::warn!("[SESSION] Error pausing stream: {}", e);
            }
            drop(stream);
        });

        let startup = ready_rx
            .recv()
            .map_err(|_| anyhow!("Capture thread exited before starting"))
            .and_then(|result| result);
        let mut session = session.with_thread(thread_handle);
        if let Err(e) = startup {
            session.stop_listening();
            return Err(e);
        }
        Ok(session)
    }

    /// Starts a session fed from an arbitrary frame channel.
    ///
    /// The session ends on its own when the channel disconnects, after a final
    /// analysis of whatever was received.
    pub fn from_frames(frames: Receiver<Vec<f32>>, sample_rate: u32, config: SessionConfig) -> Self {
        let (session, worker) = Self::prepare(config);
        let thread_handle = thread::spawn(move || worker.run(frames, sample_rate));
        session.with_thread(thread_handle)
    }

    fn prepare(config: SessionConfig) -> (Self, Worker) {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (readings_tx, readings_rx) = crossbeam_channel::bounded(READING_QUEUE);
        let history: History =
            Arc::new(Mutex::new(VecDeque::with_capacity(config.history_len.max(1))));

        let worker = Worker {
            estimator: PitchEstimator::new(config.estimator),
            config,
            shutdown_rx,
            readings_tx,
            history: Arc::clone(&history),
        };
        let session = Self {
            shutdown_tx,
            thread_handle: None,
            readings_rx,
            history,
        };
        (session, worker)
    }

    fn with_thread(mut self, handle: JoinHandle<()>) -> Self {
        self.thread_handle = Some(handle);
        self
    }

    /// Channel of readings emitted while the session runs.
    pub fn readings(&self) -> Receiver<PitchReading> {
        self.readings_rx.clone()
    }

    /// Readings currently held for averaging, oldest first.
    pub fn history(&self) -> Vec<PitchReading> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Averages the history frequencies and maps the mean back to a note.
    pub fn get_average_pitch(&self) -> Option<PitchReading> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        average_reading(history.iter())
    }

    /// True while the worker thread is running.
    pub fn is_listening(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Ends the session and waits for the worker. Safe to call repeatedly.
    pub fn stop_listening(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            log::info!("[SESSION] Shutting down listening session...");
            // The worker may already be gone if its frame source closed.
            let _ = self.shutdown_tx.try_send(());
            if handle.join().is_err() {
                log::error!("[SESSION] Worker thread panicked");
            }
        }
    }
}

impl Drop for PitchSession {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

impl Worker {
    fn run(self, frames: Receiver<Vec<f32>>, sample_rate: u32) {
        let window_size = self.config.window_size.max(2);
        let ticker = crossbeam_channel::tick(Duration::from_millis(
            self.config.analysis_interval_ms.max(1),
        ));
        let mut window: Vec<f32> = Vec::with_capacity(window_size * 2);
        let mut fresh = false;

        log::info!("[SESSION] Entering analysis loop at {} Hz", sample_rate);
        loop {
            crossbeam_channel::select! {
                recv(frames) -> msg => match msg {
                    Ok(frame) => {
                        window.extend_from_slice(&frame);
                        if window.len() > window_size {
                            window.drain(..window.len() - window_size);
                        }
                        fresh = true;
                    }
                    Err(_) => {
                        log::info!("[SESSION] Frame source closed");
                        if fresh {
                            self.analyze(&window, window_size, sample_rate);
                        }
                        break;
                    }
                },
                recv(ticker) -> _ => {
                    if fresh && self.analyze(&window, window_size, sample_rate) {
                        fresh = false;
                    }
                },
                recv(self.shutdown_rx) -> _ => {
                    log::info!("[SESSION] Received shutdown signal");
                    break;
                },
            }
        }
        log::info!("[SESSION] Analysis loop finished");
    }

    /// Runs one estimation. Returns false if the window is not yet full.
    fn analyze(&self, window: &[f32], window_size: usize, sample_rate: u32) -> bool {
        if window.len() < window_size {
            return false;
        }
        let Some(reading) = self
            .estimator
            .estimate(window, sample_rate)
            .and_then(map_to_note)
        else {
            return true;
        };

        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push_back(reading);
            while history.len() > self.config.history_len.max(1) {
                history.pop_front();
            }
        }

        log::debug!(
            "[SESSION] {} {:+} cents ({:.1} Hz)",
            reading.note_name(),
            reading.cents_offset,
            reading.frequency_hz
        );
        if self.readings_tx.try_send(reading).is_err() {
            log::debug!("[SESSION] Reading queue full, dropping reading");
        }
        true
    }
}
