//! tone - play instrument tones and listen for pitch from the terminal
//!
//! Thin front end over `tone-core`: the engine plays notes and chords, the
//! pitch session reports what the microphone hears.

mod settings;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tone_core::notes::ChordType;
use tone_core::pitch::PitchEstimator;
use tone_core::timbre::instrument_ids;
use tone_core::tuning::{PitchReading, average_reading};
use tone_core::{
    Note, PitchClass, PitchSession, PlaybackKind, PlaybackOutcome, SampleBuffer, ToneEngine,
    map_to_note, select_adapter, spectrum, synthesize, timbre_for, wav,
};

use settings::{AppConfig, load_app_config};

#[derive(Parser)]
#[command(name = "tone")]
#[command(about = "Instrument tone synthesizer and pitch listener")]
#[command(version)]
struct Cli {
    /// JSON settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Playback path: graph (direct oscillator) or encoded (WAV buffer)
    #[arg(short, long, global = true)]
    playback: Option<PlaybackKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one or more notes together (e.g. C4 E4 G4)
    Note {
        #[arg(required = true)]
        notes: Vec<Note>,

        /// Instrument id (see `tone instruments`)
        #[arg(short, long)]
        instrument: Option<String>,

        /// Duration in seconds
        #[arg(short, long, default_value_t = 1.0)]
        duration: f32,
    },

    /// Play a chord rooted in octave 4 (e.g. C major, F# m7)
    Chord {
        root: PitchClass,

        #[arg(default_value = "major")]
        chord_type: ChordType,

        #[arg(short, long)]
        instrument: Option<String>,

        #[arg(short, long, default_value_t = 1.5)]
        duration: f32,
    },

    /// Synthesize notes into a 16-bit mono WAV file
    Render {
        output: PathBuf,

        #[arg(required = true)]
        notes: Vec<Note>,

        #[arg(short, long)]
        instrument: Option<String>,

        #[arg(short, long, default_value_t = 1.0)]
        duration: f32,
    },

    /// Listen on the default input device and print detected notes
    Listen {
        /// How long to listen
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f32,

        /// Print readings as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Estimate the pitch of a WAV file window by window
    Analyze { input: PathBuf },

    /// List the available instruments
    Instruments,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = load_app_config(cli.config.as_deref())?;
    if let Some(kind) = cli.playback {
        config.playback = kind;
    }

    match cli.command {
        Commands::Note {
            notes,
            instrument,
            duration,
        } => {
            let engine = build_engine(&config);
            let outcome = engine.play_tone(&notes, instrument.as_deref(), duration)?;
            report(outcome);
        }

        Commands::Chord {
            root,
            chord_type,
            instrument,
            duration,
        } => {
            let engine = build_engine(&config);
            let outcome = engine.play_chord(root, chord_type, instrument.as_deref(), duration)?;
            report(outcome);
        }

        Commands::Render {
            output,
            notes,
            instrument,
            duration,
        } => {
            let buffer = render_tone(&config, &notes, instrument.as_deref(), duration)?;
            log::info!("Rendering {} samples -> {:?}", buffer.len(), output);
            wav::write_wav(&output, &buffer)?;
            log::info!("Done!");
        }

        Commands::Listen { seconds, json } => listen(&config, seconds, json)?,

        Commands::Analyze { input } => analyze(&config, &input)?,

        Commands::Instruments => {
            for id in instrument_ids() {
                let timbre = timbre_for(id)?;
                println!(
                    "{:<8} {:?}, {} harmonic(s), A {:.2}s D {:.2}s S {:.2} R {:.2}s",
                    id,
                    timbre.shape,
                    timbre.harmonics.len(),
                    timbre.attack_sec,
                    timbre.decay_sec,
                    timbre.sustain_level,
                    timbre.release_sec
                );
            }
        }
    }

    Ok(())
}

fn build_engine(config: &AppConfig) -> ToneEngine {
    ToneEngine::with_settings(select_adapter(config.playback), config.engine.clone())
}

/// Synthesizes notes with the same instrument and volume rules as playback.
fn render_tone(
    config: &AppConfig,
    notes: &[Note],
    instrument: Option<&str>,
    duration: f32,
) -> Result<SampleBuffer> {
    let settings = config.engine.clone().clamped();
    let timbre = timbre_for(instrument.unwrap_or(&settings.instrument))?;
    let frequencies: Vec<f32> = notes.iter().map(|n| n.frequency()).collect();
    Ok(synthesize(&frequencies, timbre, duration, settings.volume)?)
}

fn report(outcome: PlaybackOutcome) {
    match outcome {
        PlaybackOutcome::Completed => log::info!("Done!"),
        PlaybackOutcome::Stopped => log::info!("Stopped"),
        PlaybackOutcome::Failed => log::warn!("No sound could be played on this system"),
    }
}

fn print_reading(reading: &PitchReading, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(reading)?);
    } else {
        println!(
            "{:<4} {:+4} cents  {:8.2} Hz  confidence {:.2}",
            reading.note_name(),
            reading.cents_offset,
            reading.frequency_hz,
            reading.confidence
        );
    }
    Ok(())
}

fn listen(config: &AppConfig, seconds: f32, json: bool) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be positive, got {}", seconds);
    }
    let mut session = PitchSession::start_listening(config.session.clone())
        .context("Could not start listening")?;
    let readings = session.readings();
    let deadline = Instant::now() + Duration::from_secs_f32(seconds);

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match readings.recv_timeout(deadline - now) {
            Ok(reading) => print_reading(&reading, json)?,
            // Timed out, or the session ended on its own.
            Err(_) => break,
        }
    }

    session.stop_listening();
    match session.get_average_pitch() {
        Some(average) => {
            if !json {
                println!("average:");
            }
            print_reading(&average, json)?;
        }
        None => log::info!("No pitch detected"),
    }
    Ok(())
}

/// Reads a WAV file as mono floats in [-1, 1], keeping the first channel.
fn read_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .context("Failed to decode samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .context("Failed to decode samples")?
        }
    };
    let mono = interleaved.into_iter().step_by(channels).collect();
    Ok((mono, spec.sample_rate))
}

fn analyze(config: &AppConfig, input: &Path) -> Result<()> {
    let (samples, sample_rate) = read_mono(input)?;
    let window_size = config.session.window_size.max(2);
    if samples.len() < window_size {
        bail!(
            "{:?} is too short: {} samples, need at least {}",
            input,
            samples.len(),
            window_size
        );
    }
    let estimator = PitchEstimator::new(config.session.estimator);
    log::info!(
        "Analyzing {:?}: {} samples at {} Hz, window {}",
        input,
        samples.len(),
        sample_rate,
        window_size
    );

    let mut readings = Vec::new();
    for (index, window) in samples.chunks_exact(window_size).enumerate() {
        let start_sec = (index * window_size) as f32 / sample_rate as f32;
        let peak = spectrum::peak_frequency(&spectrum::magnitude_spectrum(window), sample_rate);
        match estimator.estimate(window, sample_rate).and_then(map_to_note) {
            Some(reading) => {
                println!(
                    "{:7.3}s  {:<4} {:+4} cents  {:8.2} Hz  (spectral peak {})",
                    start_sec,
                    reading.note_name(),
                    reading.cents_offset,
                    reading.frequency_hz,
                    peak.map_or_else(|| "-".to_string(), |p| format!("{p:.2} Hz"))
                );
                readings.push(reading);
            }
            None => println!("{:7.3}s  -", start_sec),
        }
    }

    match average_reading(&readings) {
        Some(average) => println!(
            "average: {} {:+} cents ({:.2} Hz)",
            average.note_name(),
            average.cents_offset,
            average.frequency_hz
        ),
        None => println!("average: no pitch detected"),
    }
    Ok(())
}
