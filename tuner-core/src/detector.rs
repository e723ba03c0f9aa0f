//! # Pitch Detector
//!
//! Per-frame orchestration: validity gate, autocorrelation, threshold grid
//! search, candidate selection and Kalman smoothing.

use crate::audio::AudioFrame;
use crate::config::TunerConfig;
use crate::error::TunerError;
use crate::fft::AutocorrelationEngine;
use crate::kalman::KalmanTracker;
use crate::pitch::{self, Moments, SILENCE_WINDOW_SIZE};
use crate::tuning::{cents_between, Pitch, PitchTable};

/// A smoothed observation of how far the input is from its nearest pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchError {
    expected: Pitch,
    period: f64,
    variance: f64,
}

impl PitchError {
    pub fn new(expected: Pitch, period: f64, variance: f64) -> Self {
        Self {
            expected,
            period,
            variance,
        }
    }

    /// The table pitch the input was matched to.
    pub fn expected(&self) -> &Pitch {
        &self.expected
    }

    /// Smoothed period estimate in seconds.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Covariance of the period estimate in seconds².
    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Measured frequency in Hz.
    pub fn actual_freq(&self) -> f64 {
        1.0 / self.period
    }

    /// Signed tuning error in cents; positive is sharp.
    pub fn error_in_cents(&self) -> f64 {
        cents_between(self.actual_freq(), self.expected.freq)
    }

    /// Number of bands a strobe display draws for this octave.
    pub fn octave_bands(&self) -> i32 {
        2 * (self.expected.octave + 1)
    }
}

/// Picks the measurement the detector reports out of the viable candidates.
///
/// The lowest pitch by (octave, pitch class) wins, even when a higher pitch
/// has a smaller variance; variance only decides between candidates matched
/// to the same pitch.
///
/// # Arguments
/// * `candidates` - Raw measurements, each already matched to its closest pitch
///
/// # Returns
/// The selected measurement, or `None` when there are no candidates.
pub fn select_best(candidates: impl IntoIterator<Item = PitchError>) -> Option<PitchError> {
    candidates.into_iter().min_by(|a, b| {
        a.expected
            .cmp(&b.expected)
            .then_with(|| a.variance.total_cmp(&b.variance))
    })
}

/// Stateful detector for one configuration.
///
/// Holds the pitch table, the transform plans sized to the frame and the
/// current Kalman lock. Changing any part of the configuration means building
/// a new detector.
pub struct PitchDetector {
    config: TunerConfig,
    pitches: PitchTable,
    engine: AutocorrelationEngine,
    smallest_period: f64,
    longest_period: f64,
    tracker: Option<KalmanTracker>,
}

impl PitchDetector {
    /// Builds a detector for `config`.
    ///
    /// # Errors
    /// * `TunerError::InvalidFrameSize` if the frame size is not a power of
    ///   two of at least [`SILENCE_WINDOW_SIZE`] samples
    pub fn new(config: TunerConfig) -> Result<Self, TunerError> {
        if config.frame_size < SILENCE_WINDOW_SIZE || !config.frame_size.is_power_of_two() {
            return Err(TunerError::InvalidFrameSize(config.frame_size));
        }

        let pitches = PitchTable::build(config.reference_hz as f64);
        let smallest_period = pitches.smallest_period();
        let longest_period = pitches.longest_period();

        log::debug!(
            "Building detector: A4={} Hz, threshold={:.3}, frame={} samples",
            config.reference_hz,
            config.detection_threshold,
            config.frame_size
        );

        Ok(Self {
            config,
            pitches,
            engine: AutocorrelationEngine::new(config.frame_size),
            smallest_period,
            longest_period,
            tracker: None,
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn pitches(&self) -> &PitchTable {
        &self.pitches
    }

    /// The pitch the Kalman filter is currently locked to, if any.
    pub fn locked_pitch(&self) -> Option<&Pitch> {
        self.tracker.as_ref().map(KalmanTracker::locked_pitch)
    }

    pub fn find_closest_pitch(&self, freq: f64) -> Pitch {
        self.pitches.find_closest_pitch(freq)
    }

    /// Analyses one frame.
    ///
    /// Returns `Ok(None)` when the frame is rejected by the validity gate or
    /// no period candidate survives; the Kalman lock is left untouched in
    /// that case.
    ///
    /// # Errors
    /// * `TunerError::FrameSizeMismatch` if the frame length differs from the
    ///   configured frame size
    /// * `TunerError::InvalidSampleRate` if the frame's sample rate is zero
    pub fn detect(&mut self, frame: &AudioFrame) -> Result<Option<PitchError>, TunerError> {
        if frame.samples.len() != self.config.frame_size {
            return Err(TunerError::FrameSizeMismatch {
                expected: self.config.frame_size,
                got: frame.samples.len(),
            });
        }
        if frame.sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate);
        }

        if !pitch::is_audio_valid(&frame.samples, self.config.detection_threshold) {
            log::trace!("Frame rejected by validity gate");
            return Ok(None);
        }

        let Some(measurement) = self.measure(frame)? else {
            log::trace!("No viable period candidate");
            return Ok(None);
        };

        let state = KalmanTracker::observe(
            &mut self.tracker,
            measurement.expected,
            measurement.period,
            measurement.variance,
            frame.duration_seconds(),
        );

        Ok(Some(PitchError::new(measurement.expected, state.x, state.p)))
    }

    /// Runs the grid search and returns the best raw measurement.
    fn measure(&mut self, frame: &AudioFrame) -> Result<Option<PitchError>, TunerError> {
        let autocorr = self.engine.autocorrelate(&frame.samples)?;
        let candidates = pitch::period_candidates(&autocorr, frame.sample_rate);

        let best = select_best(
            candidates
                .iter()
                .filter(|moments| moments.is_viable(self.smallest_period, self.longest_period))
                .map(|&Moments { mean, variance }| {
                    let expected = self.pitches.find_closest_pitch(1.0 / mean);
                    PitchError::new(expected, mean, variance)
                }),
        );

        if let Some(best) = &best {
            log::trace!(
                "Best candidate {} at {:.3} Hz (variance {:.3e})",
                best.expected,
                best.actual_freq(),
                best.variance
            );
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Accuracy;
    use crate::tuning::PitchName;
    use std::f64::consts::PI;

    const SAMPLE_RATE: u32 = 44100;

    fn sine_frame(freq: f64, offset: f64, len: usize) -> AudioFrame {
        let samples = (0..len)
            .map(|i| ((2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin() + offset) as f32)
            .collect();
        AudioFrame::new(samples, SAMPLE_RATE)
    }

    fn detector(frame_size: usize) -> PitchDetector {
        PitchDetector::new(TunerConfig {
            frame_size,
            ..TunerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_frame_sizes() {
        for size in [0, 512, 5000] {
            let config = TunerConfig {
                frame_size: size,
                ..TunerConfig::default()
            };
            assert_eq!(
                PitchDetector::new(config).err(),
                Some(TunerError::InvalidFrameSize(size))
            );
        }
    }

    #[test]
    fn test_frame_size_mismatch_fails_fast() {
        let mut detector = detector(4096);
        let frame = sine_frame(440.0, 0.0, 8192);
        assert_eq!(
            detector.detect(&frame),
            Err(TunerError::FrameSizeMismatch { expected: 4096, got: 8192 })
        );
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        let mut detector = detector(4096);
        let frame = AudioFrame::new(vec![0.5; 4096], 0);
        assert_eq!(detector.detect(&frame), Err(TunerError::InvalidSampleRate));
    }

    #[test]
    fn test_detects_a4() {
        let mut detector = detector(4096);
        let result = detector.detect(&sine_frame(440.0, 0.0, 4096)).unwrap().unwrap();
        assert_eq!(result.expected().name, PitchName::A);
        assert_eq!(result.expected().octave, 4);
        assert!((result.actual_freq() / 440.0 - 1.0).abs() < 1e-3);
        assert!(result.error_in_cents().abs() < 2.0);
        assert_eq!(result.octave_bands(), 10);
    }

    #[test]
    fn test_missed_frame_keeps_lock() {
        let mut detector = detector(4096);
        detector.detect(&sine_frame(440.0, 0.0, 4096)).unwrap();
        let locked = *detector.locked_pitch().unwrap();

        let silence = AudioFrame::new(vec![0.0; 4096], SAMPLE_RATE);
        assert_eq!(detector.detect(&silence), Ok(None));
        assert_eq!(detector.locked_pitch(), Some(&locked));
    }

    #[test]
    fn test_detects_at_every_accuracy() {
        for accuracy in Accuracy::ALL {
            let mut detector = PitchDetector::new(TunerConfig::new(440, 0.1, accuracy)).unwrap();
            let result = detector
                .detect(&sine_frame(196.0, 0.0, accuracy.sample_size()))
                .unwrap()
                .unwrap();
            assert_eq!(result.expected().name, PitchName::G);
            assert_eq!(result.expected().octave, 3);
        }
    }

    #[test]
    fn test_lower_octave_wins_over_smaller_variance() {
        let a3 = Pitch { name: PitchName::A, octave: 3, freq: 220.0 };
        let a4 = Pitch { name: PitchName::A, octave: 4, freq: 440.0 };
        let candidates = [
            PitchError::new(a4, 1.0 / 440.0, 1e-12),
            PitchError::new(a3, 1.0 / 220.0, 1e-6),
        ];

        let best = select_best(candidates).unwrap();
        assert_eq!(best.expected().octave, 3);
        assert_eq!(best.variance(), 1e-6);
    }

    #[test]
    fn test_lower_class_wins_within_octave() {
        let g4 = Pitch { name: PitchName::G, octave: 4, freq: 392.0 };
        let a4 = Pitch { name: PitchName::A, octave: 4, freq: 440.0 };
        let candidates = [
            PitchError::new(a4, 1.0 / 440.0, 1e-12),
            PitchError::new(g4, 1.0 / 392.0, 1e-6),
        ];

        assert_eq!(select_best(candidates).unwrap().expected().name, PitchName::G);
    }

    #[test]
    fn test_variance_breaks_ties_for_same_pitch() {
        let a4 = Pitch { name: PitchName::A, octave: 4, freq: 440.0 };
        let candidates = [
            PitchError::new(a4, 1.0 / 441.0, 2e-9),
            PitchError::new(a4, 1.0 / 439.0, 1e-9),
            PitchError::new(a4, 1.0 / 440.5, 3e-9),
        ];

        let best = select_best(candidates).unwrap();
        assert_eq!(best.variance(), 1e-9);
        assert_eq!(best.period(), 1.0 / 439.0);
    }

    #[test]
    fn test_no_candidates_selects_nothing() {
        assert_eq!(select_best(Vec::new()), None);
    }

    #[test]
    fn test_pitch_error_derivations() {
        let expected = Pitch { name: PitchName::A, octave: 4, freq: 440.0 };
        let sharp = PitchError::new(expected, 1.0 / (440.0 * 2.0_f64.powf(10.0 / 1200.0)), 0.0);
        assert!((sharp.error_in_cents() - 10.0).abs() < 1e-9);

        let low = PitchError::new(Pitch { name: PitchName::C, octave: 0, freq: 16.35 }, 1.0 / 16.35, 0.0);
        assert_eq!(low.octave_bands(), 2);
    }
}
