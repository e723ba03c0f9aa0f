//! Error types for the pitch-detection pipeline.
//!
//! A frame with no detectable pitch is not an error: `PitchDetector::detect`
//! reports it as `Ok(None)`. The variants here cover programming mistakes in
//! a collaborator and settings values that cannot be interpreted.

use thiserror::Error;

/// Errors returned by the tuner core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TunerError {
    /// A frame did not have the sample count the detector was built for.
    #[error("expected frame of length {expected}, got {got}")]
    FrameSizeMismatch {
        /// The frame size the detector was configured with.
        expected: usize,
        /// The length of the frame that was passed in.
        got: usize,
    },

    /// The configured frame size cannot be analysed.
    #[error("invalid frame size {0}: must be a power of two of at least 1024 samples")]
    InvalidFrameSize(usize),

    /// A frame reported a sample rate of zero.
    #[error("frame sample rate must be positive")]
    InvalidSampleRate,

    /// The stored accuracy label is not one of the known tiers.
    #[error("unknown accuracy value: {0}")]
    UnknownAccuracy(String),
}
