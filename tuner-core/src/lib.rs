// tuner-core/src/lib.rs

//! The core logic for the strobe tuner.
//! This crate estimates the fundamental frequency of a monophonic signal,
//! quantizes it to the nearest equal-tempered pitch and smooths the tuning
//! error with a per-pitch Kalman filter. It is completely headless
//! and contains no rendering code.

pub mod audio;
pub mod config;
pub mod detector;
pub mod error;
pub mod fft;
pub mod kalman;
pub mod pitch;
pub mod session;
pub mod tuning;

pub use audio::{AudioFrame, CaptureSource, MicCapture};
pub use config::{Accuracy, StoredSettings, TunerConfig};
pub use detector::{PitchDetector, PitchError};
pub use error::TunerError;
pub use session::{SharedSettings, TunerSession};
pub use tuning::{NoteConvention, Pitch, PitchName, PitchTable};
