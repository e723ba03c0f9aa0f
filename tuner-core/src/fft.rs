//! # Autocorrelation Module
//!
//! FFT-accelerated correlation of a frame against a zero-padded copy of its
//! own first half. Transform plans are created once per frame size and reused
//! for every frame.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::TunerError;

/// Computes the correlation sequence the period estimator works on.
///
/// For a frame `x` of length N, lag `k` of the output is
/// `sum(x[n + k] * x[n] for n < N/2)`. Only lags `0..=N/2` see a full
/// overlap, so only those are returned.
pub struct AutocorrelationEngine {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    frame_spectrum: Vec<Complex<f32>>,
    window_spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl AutocorrelationEngine {
    /// Plans forward and inverse transforms for frames of `size` samples.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            size,
            forward,
            inverse,
            frame_spectrum: vec![Complex::default(); size],
            window_spectrum: vec![Complex::default(); size],
            scratch: vec![Complex::default(); scratch_len],
        }
    }

    /// Frame length the transforms were planned for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns lags `0..=N/2` of the correlation sequence.
    ///
    /// # Arguments
    /// * `signal` - One frame of exactly `size()` samples
    ///
    /// # Returns
    /// `N/2 + 1` correlation values. The inverse transform is scaled by `1/N`,
    /// so each value equals the direct sum documented on the type.
    ///
    /// # Errors
    /// * `TunerError::FrameSizeMismatch` if `signal.len()` differs from the
    ///   planned size
    pub fn autocorrelate(&mut self, signal: &[f32]) -> Result<Vec<f32>, TunerError> {
        if signal.len() != self.size {
            return Err(TunerError::FrameSizeMismatch {
                expected: self.size,
                got: signal.len(),
            });
        }

        let half = self.size / 2;
        for (i, (frame, window)) in self
            .frame_spectrum
            .iter_mut()
            .zip(self.window_spectrum.iter_mut())
            .enumerate()
        {
            let sample = signal[i];
            *frame = Complex { re: sample, im: 0.0 };
            *window = if i < half {
                Complex { re: sample, im: 0.0 }
            } else {
                Complex::default()
            };
        }

        self.forward
            .process_with_scratch(&mut self.frame_spectrum, &mut self.scratch);
        self.forward
            .process_with_scratch(&mut self.window_spectrum, &mut self.scratch);

        for (frame, window) in self.frame_spectrum.iter_mut().zip(&self.window_spectrum) {
            *frame *= window.conj();
        }

        self.inverse
            .process_with_scratch(&mut self.frame_spectrum, &mut self.scratch);

        // rustfft leaves the inverse unnormalized
        let scale = 1.0 / self.size as f32;
        Ok(self
            .frame_spectrum
            .iter()
            .take(half + 1)
            .map(|c| c.re * scale)
            .collect())
    }
}
