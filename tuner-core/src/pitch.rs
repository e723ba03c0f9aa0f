//! # Period Estimation Module
//!
//! Turns a correlation sequence into period candidates by locating its
//! downward zero crossings at several threshold offsets.
//!
//! ## Features
//! - Energy and amplitude gate that rejects silence before any FFT work
//! - Sub-sample zero crossings through linear interpolation
//! - Unbiased mean/variance of the crossing intervals
//! - Five-step offset grid relative to the correlation maximum

/// Number of samples examined at each end of a frame by [`is_audio_valid`].
pub const SILENCE_WINDOW_SIZE: usize = 1024;

/// Number of threshold offsets tried per frame.
pub const GRID_SEARCH_NUM: usize = 5;

/// Sample statistics of the intervals between successive zero crossings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    /// Mean period in seconds
    pub mean: f64,
    /// Variance of the period in seconds²
    pub variance: f64,
}

impl Moments {
    fn undefined() -> Self {
        Self {
            mean: f64::NAN,
            variance: f64::NAN,
        }
    }

    /// Builds moments from a list of interval lengths.
    ///
    /// The variance divides by `max(count - 1, 1)`. An empty list yields a
    /// non-finite mean.
    ///
    /// # Arguments
    /// * `intervals` - Times between successive crossings, in seconds
    ///
    /// # Returns
    /// The mean and unbiased variance, or NaN for both when `intervals` is empty
    pub fn from_intervals(intervals: &[f64]) -> Self {
        if intervals.is_empty() {
            return Self::undefined();
        }

        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let squared: f64 = intervals.iter().map(|d| (d - mean) * (d - mean)).sum();
        let variance = squared / intervals.len().saturating_sub(1).max(1) as f64;

        Self { mean, variance }
    }

    /// True when the mean period lies within `[smallest, longest]`.
    pub fn is_viable(&self, smallest: f64, longest: f64) -> bool {
        self.mean.is_finite() && self.mean >= smallest && self.mean <= longest
    }
}

/// Cheap gate that rejects silence, fades and sub-threshold noise.
///
/// A frame passes when the energy of both its first and last
/// [`SILENCE_WINDOW_SIZE`] samples reaches `threshold² · window`, and at least
/// one sample exceeds `threshold`.
///
/// # Arguments
/// * `signal` - One frame of samples
/// * `threshold` - Detection threshold in sample units
///
/// # Returns
/// `false` for frames shorter than [`SILENCE_WINDOW_SIZE`]
pub fn is_audio_valid(signal: &[f32], threshold: f64) -> bool {
    if signal.len() < SILENCE_WINDOW_SIZE {
        return false;
    }

    let energy_threshold = threshold * threshold * SILENCE_WINDOW_SIZE as f64;
    let energy = |window: &[f32]| window.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();

    if energy(&signal[..SILENCE_WINDOW_SIZE]) < energy_threshold {
        return false;
    }

    if energy(&signal[signal.len() - SILENCE_WINDOW_SIZE..]) < energy_threshold {
        return false;
    }

    signal.iter().any(|&s| s as f64 > threshold)
}

/// Finds the times, in seconds, where `signal` falls through `offset`.
///
/// A crossing is a pair `(x1, x2)` with `x1 > offset >= x2`; its time is
/// linearly interpolated within the sample interval.
///
/// # Arguments
/// * `signal` - The sequence to scan
/// * `sample_rate` - Samples per second of `signal`
/// * `offset` - The level the sequence must fall through
///
/// # Returns
/// Crossing times in ascending order
pub fn find_zero_crossings(signal: &[f32], sample_rate: u32, offset: f64) -> Vec<f64> {
    let dt = 1.0 / sample_rate as f64;

    signal
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let x1 = pair[0] as f64;
            let x2 = pair[1] as f64;
            if x1 > offset && x2 <= offset {
                let t1 = dt * i as f64;
                let slope = (x2 - x1) / dt;
                Some((offset - x1) / slope + t1)
            } else {
                None
            }
        })
        .collect()
}

/// Estimates the period from the crossings of `signal` through `offset`.
///
/// Fewer than two crossings give undefined moments, which are never viable.
pub fn period_from_zero_crossings(signal: &[f32], sample_rate: u32, offset: f64) -> Moments {
    let zeros = find_zero_crossings(signal, sample_rate, offset);
    let deltas: Vec<f64> = zeros.windows(2).map(|pair| pair[1] - pair[0]).collect();
    Moments::from_intervals(&deltas)
}

/// Runs the threshold grid search over a correlation sequence.
///
/// Offsets are `i · max / GRID_SEARCH_NUM` for `i` in `0..GRID_SEARCH_NUM`.
/// Every grid point yields one entry; the caller discards non-viable ones.
///
/// # Arguments
/// * `autocorr` - Correlation lags `0..=N/2`
/// * `sample_rate` - Sample rate of the frame the correlation came from
///
/// # Returns
/// [`GRID_SEARCH_NUM`] moments, or none for an empty sequence
pub fn period_candidates(autocorr: &[f32], sample_rate: u32) -> Vec<Moments> {
    let Some(max) = autocorr.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };
    let dx = max as f64 / GRID_SEARCH_NUM as f64;

    (0..GRID_SEARCH_NUM)
        .map(|i| period_from_zero_crossings(autocorr, sample_rate, i as f64 * dx))
        .collect()
}
