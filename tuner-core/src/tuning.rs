//! # Musical Tuning Module
//!
//! Equal-tempered pitch tables built around a tunable A4 reference, plus the
//! nearest-pitch lookup used to quantize a measured frequency.
//!
//! ## Features
//! - Twelve pitch classes with English and solfège display names
//! - Tables spanning C0 to B8 for any reference frequency
//! - Cent arithmetic based on [`cent_ratio`]
//! - Binary-search nearest-pitch matching with round-up on ties

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Default reference frequency for A4, in Hz.
pub const DEFAULT_REFERENCE_HZ: u32 = 440;

/// Lowest octave present in a [`PitchTable`].
pub const LOWEST_OCTAVE: i32 = 0;

/// Highest octave present in a [`PitchTable`].
pub const HIGHEST_OCTAVE: i32 = 8;

/// Slack, in cents, allowed above the highest table pitch.
pub const UPPER_SLACK_CENTS: f64 = 49.0;

/// Slack, in cents, allowed below the lowest table pitch.
pub const LOWER_SLACK_CENTS: f64 = 50.0;

const SEMITONES_PER_OCTAVE: i32 = 12;
const CENTS_PER_SEMITONE: f64 = 100.0;

/// The frequency ratio of one cent, 2^(1/1200).
static CENT_RATIO: Lazy<f64> = Lazy::new(|| 2.0_f64.powf(1.0 / 1200.0));

/// Returns the multiplicative frequency step equivalent to one cent.
///
/// # Returns
/// `2^(1/1200)`, computed once and cached
pub fn cent_ratio() -> f64 {
    *CENT_RATIO
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values are flat.
///
/// # Arguments
/// * `freq` - The measured frequency in Hz
/// * `target_freq` - The frequency to compare against in Hz
///
/// # Returns
/// The signed distance in cents
pub fn cents_between(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// The twelve pitch classes of an octave, starting at C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PitchName {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

/// How pitch names are rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteConvention {
    #[default]
    English,
    Solfege,
}

impl PitchName {
    /// All pitch classes in index order.
    pub const ALL: [PitchName; 12] = [
        PitchName::C,
        PitchName::CSharp,
        PitchName::D,
        PitchName::DSharp,
        PitchName::E,
        PitchName::F,
        PitchName::FSharp,
        PitchName::G,
        PitchName::GSharp,
        PitchName::A,
        PitchName::ASharp,
        PitchName::B,
    ];

    /// Position within the octave, C = 0 through B = 11.
    pub fn index(self) -> usize {
        self as usize
    }

    /// English letter name, with both enharmonic spellings for the sharps.
    pub fn english_name(self) -> &'static str {
        match self {
            PitchName::C => "C",
            PitchName::CSharp => "C♯ / D♭",
            PitchName::D => "D",
            PitchName::DSharp => "D♯ / E♭",
            PitchName::E => "E",
            PitchName::F => "F",
            PitchName::FSharp => "F♯ / G♭",
            PitchName::G => "G",
            PitchName::GSharp => "G♯ / A♭",
            PitchName::A => "A",
            PitchName::ASharp => "A♯ / B♭",
            PitchName::B => "B",
        }
    }

    /// Fixed-do solfège name, with both enharmonic spellings for the sharps.
    pub fn solfege_name(self) -> &'static str {
        match self {
            PitchName::C => "Do",
            PitchName::CSharp => "Do♯ / Re♭",
            PitchName::D => "Re",
            PitchName::DSharp => "Re♯ / Mi♭",
            PitchName::E => "Mi",
            PitchName::F => "Fa",
            PitchName::FSharp => "Fa♯ / Sol♭",
            PitchName::G => "Sol",
            PitchName::GSharp => "Sol♯ / La♭",
            PitchName::A => "La",
            PitchName::ASharp => "La♯ / Si♭",
            PitchName::B => "Si",
        }
    }

    /// Name of this pitch class in the given convention.
    ///
    /// # Arguments
    /// * `convention` - English letters or solfège syllables
    ///
    /// # Returns
    /// A static display string such as `"A"` or `"La"`
    pub fn display_name(self, convention: NoteConvention) -> &'static str {
        match convention {
            NoteConvention::English => self.english_name(),
            NoteConvention::Solfege => self.solfege_name(),
        }
    }
}

/// A single named pitch with its equal-tempered frequency.
///
/// Pitches compare and order by octave and then by pitch class, never by
/// frequency, so the same note from tables with different references is
/// equal. Candidate selection in the detector relies on this to prefer the
/// lowest matched pitch.
#[derive(Debug, Clone, Copy)]
pub struct Pitch {
    pub name: PitchName,
    pub octave: i32,
    /// Frequency in Hz
    pub freq: f64,
}

impl Pitch {
    fn order_key(&self) -> (i32, usize) {
        (self.octave, self.name.index())
    }
}

impl PartialEq for Pitch {
    fn eq(&self, other: &Self) -> bool {
        self.order_key() == other.order_key()
    }
}

impl Eq for Pitch {}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name.english_name(), self.octave)
    }
}

/// An immutable, frequency-ascending table of pitches around a reference A4.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchTable {
    reference_hz: f64,
    pitches: Vec<Pitch>,
}

impl PitchTable {
    /// Builds the table for octaves [`LOWEST_OCTAVE`]..=[`HIGHEST_OCTAVE`].
    ///
    /// Each frequency is `reference · centRatio^(100·n)`, where `n` is the
    /// signed semitone distance from A4, so A4 equals the reference exactly.
    ///
    /// # Arguments
    /// * `reference_hz` - Frequency of A4 in Hz
    ///
    /// # Returns
    /// A table of 12 pitches per octave in ascending frequency order
    pub fn build(reference_hz: f64) -> Self {
        let a4_index = 4 * SEMITONES_PER_OCTAVE + PitchName::A.index() as i32;
        let pitches = (LOWEST_OCTAVE..=HIGHEST_OCTAVE)
            .flat_map(|octave| PitchName::ALL.iter().map(move |&name| (octave, name)))
            .map(|(octave, name)| {
                let semitones = octave * SEMITONES_PER_OCTAVE + name.index() as i32 - a4_index;
                let freq = reference_hz * cent_ratio().powf(CENTS_PER_SEMITONE * semitones as f64);
                Pitch { name, octave, freq }
            })
            .collect();

        Self {
            reference_hz,
            pitches,
        }
    }

    /// Frequency of A4 this table was built around.
    pub fn reference_hz(&self) -> f64 {
        self.reference_hz
    }

    /// All pitches, lowest first.
    pub fn pitches(&self) -> &[Pitch] {
        &self.pitches
    }

    /// Number of pitches in the table.
    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    /// The first table entry, C of the lowest octave.
    pub fn lowest(&self) -> &Pitch {
        &self.pitches[0]
    }

    /// The last table entry, B of the highest octave.
    pub fn highest(&self) -> &Pitch {
        &self.pitches[self.pitches.len() - 1]
    }

    /// Shortest period, in seconds, accepted as a candidate.
    ///
    /// The highest pitch raised by [`UPPER_SLACK_CENTS`].
    pub fn smallest_period(&self) -> f64 {
        1.0 / (self.highest().freq * cent_ratio().powf(UPPER_SLACK_CENTS))
    }

    /// Longest period, in seconds, accepted as a candidate.
    ///
    /// The lowest pitch lowered by [`LOWER_SLACK_CENTS`].
    pub fn longest_period(&self) -> f64 {
        1.0 / (self.lowest().freq * cent_ratio().powf(-LOWER_SLACK_CENTS))
    }

    /// Finds the table pitch closest to `freq`.
    ///
    /// Equidistant frequencies round up to the higher pitch. Frequencies
    /// outside the table resolve to the nearest edge.
    ///
    /// # Arguments
    /// * `freq` - The measured frequency in Hz
    ///
    /// # Returns
    /// A copy of the nearest table entry
    pub fn find_closest_pitch(&self, freq: f64) -> Pitch {
        let pitches = &self.pitches;
        let mut left = 0;
        let mut right = pitches.len();

        while right - left > 1 {
            let mid = (left + right) / 2;
            if pitches[mid].freq < freq {
                left = mid;
            } else {
                right = mid;
            }
        }

        if right == pitches.len() {
            pitches[pitches.len() - 1]
        } else if freq - pitches[left].freq < pitches[right].freq - freq {
            pitches[left]
        } else {
            pitches[right]
        }
    }
}
