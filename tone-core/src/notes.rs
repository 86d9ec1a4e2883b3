//! # Notes Module
//!
//! Pitch classes, note spellings, chords and the equal-temperament frequency table.
//!
//! ## Features
//! - 12 chromatic pitch classes, indexed from C
//! - Note spellings such as "C#4", "Bb3" and "A-1"
//! - Frequencies derived from A4 = 440 Hz only, so every base frequency is
//!   consistent with the note mapper in [`crate::tuning`]
//! - Chord types expanded into their member notes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToneError};

/// Reference pitch A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// Octave that `base_frequency` is expressed in.
pub const REFERENCE_OCTAVE: i32 = 4;

/// Index of A inside the C-based pitch class ordering.
pub const A_INDEX: i32 = 9;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the 12 chromatic pitch classes. Index 0 is C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order starting from C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Chromatic index, 0 (C) to 11 (B).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Pitch class for any integer index, wrapping modulo 12.
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    /// Sharp spelling of the pitch class ("C", "C#", ...).
    pub fn name(self) -> &'static str {
        SHARP_NAMES[self.index()]
    }

    /// Pitch class `semitones` above this one.
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_index(self.index() as i32 + semitones)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ToneError;

    /// Parses a sharp or flat spelling. The letter is case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::from_index(spelled_semitone(s)?))
    }
}

/// Semitone of a spelled pitch class relative to C of the same octave.
///
/// Ranges from -1 ("Cb") to 12 ("B#"); callers that track octaves carry the overflow.
fn spelled_semitone(s: &str) -> Result<i32> {
    let mut chars = s.trim().chars();
    let letter = chars
        .next()
        .ok_or_else(|| ToneError::invalid("empty pitch class"))?;
    let natural = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(ToneError::invalid(format!("unknown pitch class '{s}'"))),
    };
    let accidental = match chars.as_str() {
        "" => 0,
        "#" => 1,
        "b" => -1,
        _ => return Err(ToneError::invalid(format!("unknown pitch class '{s}'"))),
    };
    Ok(natural + accidental)
}

/// A pitch class placed in a specific octave (scientific pitch notation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl Note {
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self { pitch_class, octave }
    }

    /// Equal-temperament frequency of this note in Hz.
    pub fn frequency(self) -> f32 {
        frequency(self.pitch_class, self.octave)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for Note {
    type Err = ToneError;

    /// Parses spellings like "A4", "C#3", "Bb2" or "C-1".
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| ToneError::invalid(format!("note '{s}' has no octave")))?;
        let (name, octave) = s.split_at(split);
        let semitone = spelled_semitone(name)?;
        let octave = octave
            .parse::<i32>()
            .map_err(|_| ToneError::invalid(format!("note '{s}' has an invalid octave")))?;
        // "Cb4" is B3 and "B#3" is C4.
        Ok(Note::new(
            PitchClass::from_index(semitone),
            octave + semitone.div_euclid(12),
        ))
    }
}

/// Number of semitones between A4 and the given note.
pub fn semitones_from_a4(pitch_class: PitchClass, octave: i32) -> i32 {
    (octave - REFERENCE_OCTAVE) * 12 + (pitch_class.index() as i32 - A_INDEX)
}

/// Equal-temperament frequency of a pitch class in a given octave.
///
/// f = 440 * 2^(n/12) where n is the distance in semitones from A4.
pub fn frequency(pitch_class: PitchClass, octave: i32) -> f32 {
    let n = semitones_from_a4(pitch_class, octave) as f32;
    A4_FREQUENCY * 2.0_f32.powf(n / 12.0)
}

/// Frequency of a pitch class in the reference octave (octave 4).
pub fn base_frequency(pitch_class: PitchClass) -> f32 {
    frequency(pitch_class, REFERENCE_OCTAVE)
}

/// Chord qualities understood by `play_chord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChordType {
    Major,
    Minor,
    Diminished,
    Augmented,
    Major7,
    Minor7,
    Dominant7,
    Sus2,
    Sus4,
}

impl ChordType {
    /// Semitone offsets of each chord member above the root.
    pub fn intervals(self) -> &'static [i32] {
        match self {
            ChordType::Major => &[0, 4, 7],
            ChordType::Minor => &[0, 3, 7],
            ChordType::Diminished => &[0, 3, 6],
            ChordType::Augmented => &[0, 4, 8],
            ChordType::Major7 => &[0, 4, 7, 11],
            ChordType::Minor7 => &[0, 3, 7, 10],
            ChordType::Dominant7 => &[0, 4, 7, 10],
            ChordType::Sus2 => &[0, 2, 7],
            ChordType::Sus4 => &[0, 5, 7],
        }
    }
}

impl FromStr for ChordType {
    type Err = ToneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" => Ok(ChordType::Major),
            "minor" | "min" | "m" => Ok(ChordType::Minor),
            "dim" | "diminished" => Ok(ChordType::Diminished),
            "aug" | "augmented" => Ok(ChordType::Augmented),
            "maj7" | "major7" => Ok(ChordType::Major7),
            "m7" | "min7" | "minor7" => Ok(ChordType::Minor7),
            "7" | "dom7" | "dominant7" => Ok(ChordType::Dominant7),
            "sus2" => Ok(ChordType::Sus2),
            "sus4" => Ok(ChordType::Sus4),
            other => Err(ToneError::invalid(format!("unknown chord type '{other}'"))),
        }
    }
}

/// Expands a chord into its member notes, carrying octaves upward.
pub fn chord_notes(root: PitchClass, octave: i32, chord_type: ChordType) -> Vec<Note> {
    chord_type
        .intervals()
        .iter()
        .map(|&interval| {
            let absolute = root.index() as i32 + interval;
            Note::new(
                PitchClass::from_index(absolute),
                octave + absolute.div_euclid(12),
            )
        })
        .collect()
}
