//! Encoded tones must be readable by an ordinary PCM decoder.

use std::io::Cursor;

use tone_core::timbre::{Timbre, timbre_for};
use tone_core::{SAMPLE_RATE, synthesize, wav};

#[test]
fn one_second_sine_decodes_with_hound() {
    let buffer = synthesize(&[440.0], &Timbre::sine(), 1.0, 0.8).unwrap();
    let bytes = wav::encode(&buffer);
    assert_eq!(bytes.len(), wav::HEADER_LEN + 44_100 * 2);

    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(decoded.len(), 44_100);
    assert_eq!(decoded, buffer.samples());
}

#[test]
fn written_chord_file_round_trips_through_disk() {
    let piano = timbre_for("piano").unwrap();
    let buffer = synthesize(&[261.63, 329.63, 392.0], piano, 0.25, 1.0).unwrap();

    let path = std::env::temp_dir().join(format!("tone-core-chord-{}.wav", std::process::id()));
    wav::write_wav(&path, &buffer).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.duration() as usize, buffer.len());
    let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(decoded, buffer.samples());

    let _ = std::fs::remove_file(&path);
}
