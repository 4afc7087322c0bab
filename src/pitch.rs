// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Equal-temperament pitch mapping for the 88 keys of a piano.
//!
//! Key 1 is A0, key 49 is A4 (the reference pitch) and key 88 is C8.

use std::fmt;

/// Number of keys on a standard piano keyboard.
pub const KEY_COUNT: usize = 88;

/// The key that sounds at the reference frequency (A4).
pub const REFERENCE_KEY: u8 = 49;

/// Concert pitch for A4 in Hz.
pub const DEFAULT_REFERENCE_FREQUENCY: f64 = 440.0;

/// Semitones per octave in equal temperament.
const SEMITONES_PER_OCTAVE: f64 = 12.0;

/// Pitch-class labels, starting from C.
const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The keyboard starts on A, which sits 9 semitones above C.
const KEYBOARD_OFFSET: u8 = 9;

/// Returned when a key number falls outside 1..=88.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid key number: {key}. Must be between 1-88.")]
pub struct InvalidKeyError {
    key: i64,
}

impl InvalidKeyError {
    /// The rejected key number.
    pub fn key(&self) -> i64 {
        self.key
    }
}

/// Returned when a reference frequency is not a finite, positive number of Hz.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Invalid reference frequency: {frequency}. Must be a positive number of Hz.")]
pub struct InvalidReferenceFrequencyError {
    frequency: f64,
}

impl InvalidReferenceFrequencyError {
    /// The rejected frequency.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

/// A validated piano key number in 1..=88.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyNumber(u8);

impl KeyNumber {
    /// The lowest key (A0).
    pub const MIN: KeyNumber = KeyNumber(1);
    /// The highest key (C8).
    pub const MAX: KeyNumber = KeyNumber(KEY_COUNT as u8);

    /// Validates a raw key number.
    pub fn new(key: i64) -> Result<KeyNumber, InvalidKeyError> {
        if (Self::MIN.0 as i64..=Self::MAX.0 as i64).contains(&key) {
            Ok(KeyNumber(key as u8))
        } else {
            Err(InvalidKeyError { key })
        }
    }

    /// Returns the key number.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Returns the zero-based table index for this key.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Iterates over every key from A0 to C8.
    pub fn all() -> impl Iterator<Item = KeyNumber> {
        (Self::MIN.0..=Self::MAX.0).map(KeyNumber)
    }

    /// Returns the note name of this key.
    pub fn note_name(self) -> NoteName {
        let semitones_from_c0 = self.0 - 1 + KEYBOARD_OFFSET;
        NoteName {
            pitch_class: PITCH_CLASSES[(semitones_from_c0 % 12) as usize],
            octave: semitones_from_c0 / 12,
        }
    }
}

impl fmt::Display for KeyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pitch class and octave, e.g. "C#4".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    pitch_class: &'static str,
    octave: u8,
}

impl NoteName {
    /// The pitch-class label ("C", "C#", ... "B").
    pub fn pitch_class(&self) -> &'static str {
        self.pitch_class
    }

    /// The octave number.
    pub fn octave(&self) -> u8 {
        self.octave
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Honor width/alignment so status tables can pad note names.
        f.pad(&format!("{}{}", self.pitch_class, self.octave))
    }
}

/// Immutable pitch data for one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyDescriptor {
    key: KeyNumber,
    note_name: NoteName,
    frequency: f64,
    playback_rate: f64,
}

impl KeyDescriptor {
    pub fn key(&self) -> KeyNumber {
        self.key
    }

    pub fn note_name(&self) -> NoteName {
        self.note_name
    }

    /// Equal-temperament frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Ratio of this key's frequency to the reference frequency.
    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }
}

/// Precomputed table of all 88 keys for a given reference frequency.
#[derive(Debug, Clone)]
pub struct PitchTable {
    reference_frequency: f64,
    keys: Vec<KeyDescriptor>,
}

impl PitchTable {
    /// Builds the table with key 49 tuned to `reference_frequency` Hz.
    pub fn new(reference_frequency: f64) -> Result<PitchTable, InvalidReferenceFrequencyError> {
        if !reference_frequency.is_finite() || reference_frequency <= 0.0 {
            return Err(InvalidReferenceFrequencyError {
                frequency: reference_frequency,
            });
        }
        Ok(PitchTable::build(reference_frequency))
    }

    fn build(reference_frequency: f64) -> PitchTable {
        let keys = KeyNumber::all()
            .map(|key| {
                let frequency = equal_temperament(reference_frequency, key);
                KeyDescriptor {
                    key,
                    note_name: key.note_name(),
                    frequency,
                    playback_rate: frequency / reference_frequency,
                }
            })
            .collect();

        PitchTable {
            reference_frequency,
            keys,
        }
    }

    /// The frequency assigned to key 49.
    pub fn reference_frequency(&self) -> f64 {
        self.reference_frequency
    }

    /// Looks up the descriptor for a validated key.
    pub fn descriptor(&self, key: KeyNumber) -> &KeyDescriptor {
        &self.keys[key.index()]
    }

    /// Looks up the descriptor for a raw key number.
    pub fn lookup(&self, key: i64) -> Result<&KeyDescriptor, InvalidKeyError> {
        Ok(self.descriptor(KeyNumber::new(key)?))
    }

    /// Frequency in Hz for the given key.
    pub fn frequency_for(&self, key: i64) -> Result<f64, InvalidKeyError> {
        self.lookup(key).map(KeyDescriptor::frequency)
    }

    /// Playback rate relative to the reference frequency for the given key.
    pub fn rate_for(&self, key: i64) -> Result<f64, InvalidKeyError> {
        self.lookup(key).map(KeyDescriptor::playback_rate)
    }

    /// Note name for the given key.
    pub fn note_name_for(&self, key: i64) -> Result<NoteName, InvalidKeyError> {
        self.lookup(key).map(KeyDescriptor::note_name)
    }

    /// All 88 descriptors, ordered by key number.
    pub fn keys(&self) -> &[KeyDescriptor] {
        &self.keys
    }
}

impl Default for PitchTable {
    fn default() -> Self {
        PitchTable::build(DEFAULT_REFERENCE_FREQUENCY)
    }
}

fn equal_temperament(reference_frequency: f64, key: KeyNumber) -> f64 {
    let semitones = key.get() as f64 - REFERENCE_KEY as f64;
    reference_frequency * 2f64.powf(semitones / SEMITONES_PER_OCTAVE)
}
