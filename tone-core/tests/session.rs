//! Pitch sessions fed from a channel of synthetic frames.

use std::f32::consts::PI;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use tone_core::notes::PitchClass;
use tone_core::{PitchSession, SessionConfig};

const RATE: u32 = 44_100;
const FRAME: usize = 512;

fn config(history_len: usize) -> SessionConfig {
    SessionConfig {
        analysis_interval_ms: 5,
        history_len,
        ..SessionConfig::default()
    }
}

/// Sends `frames` consecutive frames of a continuous sine.
fn feed_sine(tx: &Sender<Vec<f32>>, frequency: f32, frames: usize) {
    for f in 0..frames {
        let frame = (0..FRAME)
            .map(|i| {
                let n = (f * FRAME + i) as f32;
                0.5 * (2.0 * PI * frequency * n / RATE as f32).sin()
            })
            .collect();
        tx.send(frame).unwrap();
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn sine_frames_produce_readings() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut session = PitchSession::from_frames(rx, RATE, config(10));
    let readings = session.readings();

    feed_sine(&tx, 440.0, 24);
    let first = readings.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first.note, PitchClass::A);
    assert_eq!(first.octave, 4);
    assert!(first.cents_offset.abs() <= 10);

    drop(tx);
    session.stop_listening();
    assert!(!session.is_listening());

    let history = session.history();
    assert!(!history.is_empty());
    assert!(history.len() <= 10);

    let average = session.get_average_pitch().unwrap();
    assert_eq!(average.note_name(), "A4");
    assert!((average.frequency_hz - 440.0).abs() < 4.4);
}

#[test]
fn silence_produces_nothing() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut session = PitchSession::from_frames(rx, RATE, config(10));

    for _ in 0..8 {
        tx.send(vec![0.0; FRAME]).unwrap();
    }
    drop(tx);
    session.stop_listening();

    assert!(session.history().is_empty());
    assert!(session.get_average_pitch().is_none());
    assert!(session.readings().try_recv().is_err());
}

#[test]
fn history_is_bounded() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut session = PitchSession::from_frames(rx, RATE, config(3));

    feed_sine(&tx, 220.0, 64);
    drop(tx);
    session.stop_listening();

    let history = session.history();
    assert!(!history.is_empty());
    assert!(history.len() <= 3);
    assert!(history.iter().all(|r| r.note == PitchClass::A && r.octave == 3));
}

#[test]
fn stop_listening_is_idempotent() {
    let (_tx, rx) = crossbeam_channel::unbounded::<Vec<f32>>();
    let mut session = PitchSession::from_frames(rx, RATE, config(10));
    assert!(session.is_listening());

    session.stop_listening();
    session.stop_listening();
    assert!(!session.is_listening());
    assert!(session.get_average_pitch().is_none());
}
