//! Configuration for pitch detection.
//!
//! [`TunerConfig`] is the immutable snapshot a detector is built from.
//! [`StoredSettings`] is the raw view of the settings collaborator and knows
//! how to turn slider positions and labels into a snapshot.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TunerError;
use crate::tuning::{NoteConvention, DEFAULT_REFERENCE_HZ};

/// Lowest reference frequency for A4 the settings accept, in Hz.
pub const MIN_REFERENCE_HZ: u32 = 400;

/// Highest reference frequency for A4 the settings accept, in Hz.
pub const MAX_REFERENCE_HZ: u32 = 500;

/// Detection threshold used when no slider position is stored.
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.1;

/// Threshold reached at the top of the noise rejection slider.
pub const MAX_DETECTION_THRESHOLD: f64 = 0.4;

/// Number of steps on the noise rejection slider.
pub const NOISE_REJECTION_MAX_VALUE: i32 = 40;

/// Trade-off between frequency resolution and latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Accuracy {
    Low,
    #[default]
    Medium,
    High,
}

impl Accuracy {
    pub const ALL: [Accuracy; 3] = [Accuracy::Low, Accuracy::Medium, Accuracy::High];

    /// Number of samples per analysis frame.
    pub fn sample_size(self) -> usize {
        match self {
            Accuracy::Low => 4096,
            Accuracy::Medium => 8192,
            Accuracy::High => 16384,
        }
    }

    /// The label the settings store uses for this tier.
    pub fn label(self) -> &'static str {
        match self {
            Accuracy::Low => "low",
            Accuracy::Medium => "med",
            Accuracy::High => "high",
        }
    }
}

impl FromStr for Accuracy {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Accuracy::Low),
            "med" => Ok(Accuracy::Medium),
            "high" => Ok(Accuracy::High),
            other => Err(TunerError::UnknownAccuracy(other.to_string())),
        }
    }
}

/// Everything a `PitchDetector` depends on. Any change needs a new detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunerConfig {
    /// Frequency of A4 in Hz
    pub reference_hz: u32,
    /// Amplitude a frame must exceed to be analysed
    pub detection_threshold: f64,
    /// Samples per frame
    pub frame_size: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            reference_hz: DEFAULT_REFERENCE_HZ,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            frame_size: Accuracy::default().sample_size(),
        }
    }
}

impl TunerConfig {
    pub fn new(reference_hz: u32, detection_threshold: f64, accuracy: Accuracy) -> Self {
        Self {
            reference_hz,
            detection_threshold,
            frame_size: accuracy.sample_size(),
        }
    }
}

/// Converts a noise rejection slider position into a detection threshold.
///
/// Positions at or below zero fall back to [`DEFAULT_DETECTION_THRESHOLD`].
pub fn threshold_from_slider(position: i32) -> f64 {
    if position > 0 {
        let step = MAX_DETECTION_THRESHOLD / NOISE_REJECTION_MAX_VALUE as f64;
        position.min(NOISE_REJECTION_MAX_VALUE) as f64 * step
    } else {
        DEFAULT_DETECTION_THRESHOLD
    }
}

/// Raw values as kept by the settings collaborator. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredSettings {
    /// Reference frequency for A4, stored as text
    pub reference_a: Option<String>,
    /// Noise rejection slider position, 0 to 40
    pub noise_rejection: Option<i32>,
    /// Accuracy label: "low", "med" or "high"
    pub accuracy: Option<String>,
    /// Note naming convention: "english" or "solfege"
    pub note_convention: Option<String>,
    /// Whether the cents error is shown as text
    pub show_error_text: Option<bool>,
}

impl StoredSettings {
    /// Reference frequency in Hz, clamped to the supported range.
    pub fn reference_frequency(&self) -> u32 {
        let Some(raw) = self.reference_a.as_deref() else {
            return DEFAULT_REFERENCE_HZ;
        };

        match raw.trim().parse::<u32>() {
            Ok(hz) if (MIN_REFERENCE_HZ..=MAX_REFERENCE_HZ).contains(&hz) => hz,
            Ok(hz) => {
                let clamped = hz.clamp(MIN_REFERENCE_HZ, MAX_REFERENCE_HZ);
                log::warn!("[SETTINGS] Reference {} Hz out of range, using {} Hz", hz, clamped);
                clamped
            }
            Err(_) => {
                log::warn!("[SETTINGS] Unreadable reference '{}', using {} Hz", raw, DEFAULT_REFERENCE_HZ);
                DEFAULT_REFERENCE_HZ
            }
        }
    }

    pub fn detection_threshold(&self) -> f64 {
        threshold_from_slider(self.noise_rejection.unwrap_or(-1))
    }

    /// The stored accuracy tier.
    ///
    /// # Errors
    /// * `TunerError::UnknownAccuracy` for any label other than the three tiers
    pub fn accuracy(&self) -> Result<Accuracy, TunerError> {
        match self.accuracy.as_deref() {
            Some(label) => label.parse(),
            None => Ok(Accuracy::default()),
        }
    }

    pub fn note_convention(&self) -> NoteConvention {
        match self.note_convention.as_deref() {
            Some("solfege") => NoteConvention::Solfege,
            Some("english") | None => NoteConvention::English,
            Some(other) => {
                log::warn!("[SETTINGS] Unknown note convention '{}', using English", other);
                NoteConvention::English
            }
        }
    }

    pub fn show_error_text(&self) -> bool {
        self.show_error_text.unwrap_or(true)
    }

    /// Builds the detector configuration these settings describe.
    pub fn tuner_config(&self) -> Result<TunerConfig, TunerError> {
        Ok(TunerConfig::new(
            self.reference_frequency(),
            self.detection_threshold(),
            self.accuracy()?,
        ))
    }
}
