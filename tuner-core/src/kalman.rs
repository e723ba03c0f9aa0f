//! # Kalman Tracking Module
//!
//! Scalar Kalman filter over the period of the currently locked pitch. The
//! filter is rebuilt, never blended, whenever the matched pitch changes.

use crate::tuning::{cent_ratio, Pitch};

/// Assumed worst-case drift of a held note, in cents per second.
pub const DRIFT_CENTS_PER_SECOND: f64 = 0.5;

/// Period estimate and its covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanState {
    /// Period estimate in seconds
    pub x: f64,
    /// Covariance in seconds²
    pub p: f64,
}

/// Computes the process noise for a lock at `period`.
///
/// A note drifting [`DRIFT_CENTS_PER_SECOND`] changes its period by
/// `period · (1 − centRatio^−drift)` per second; over one frame of
/// `duration_seconds` that squares to the returned variance.
///
/// # Arguments
/// * `period` - The locked period in seconds
/// * `duration_seconds` - Length of one analysis frame
///
/// # Returns
/// The per-frame process noise `Q` in seconds²
pub fn process_noise(period: f64, duration_seconds: f64) -> f64 {
    let drift_period = period * (1.0 - cent_ratio().powf(-DRIFT_CENTS_PER_SECOND));
    drift_period * drift_period * duration_seconds * duration_seconds
}

/// Smooths successive period measurements for one locked pitch.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanTracker {
    locked: Pitch,
    state: KalmanState,
    q: f64,
}

impl KalmanTracker {
    /// Locks onto `pitch` with the first measurement `(period, variance)`.
    ///
    /// # Arguments
    /// * `pitch` - The table pitch the measurement matched
    /// * `period` - Measured period in seconds, taken as the initial estimate
    /// * `variance` - Measurement variance, taken as the initial covariance
    /// * `duration_seconds` - Frame length, used for the process noise
    pub fn lock(pitch: Pitch, period: f64, variance: f64, duration_seconds: f64) -> Self {
        Self {
            locked: pitch,
            state: KalmanState { x: period, p: variance },
            q: process_noise(period, duration_seconds),
        }
    }

    /// The pitch this tracker was locked to.
    pub fn locked_pitch(&self) -> &Pitch {
        &self.locked
    }

    /// Current estimate and covariance.
    pub fn state(&self) -> KalmanState {
        self.state
    }

    /// Process noise fixed at lock time.
    pub fn process_noise(&self) -> f64 {
        self.q
    }

    /// Folds a measurement `z` with variance `r` into the estimate.
    ///
    /// # Arguments
    /// * `z` - Measured period in seconds
    /// * `r` - Variance of that measurement
    pub fn update(&mut self, z: f64, r: f64) {
        let predicted = self.state.p + self.q;
        let gain = predicted / (predicted + r);
        self.state.x += gain * (z - self.state.x);
        self.state.p = (1.0 - gain) * predicted;
    }

    /// Updates in place when `pitch` is the locked pitch, otherwise replaces
    /// the tracker with a fresh lock.
    ///
    /// # Returns
    /// The state after the update or re-lock
    pub fn observe(
        tracker: &mut Option<KalmanTracker>,
        pitch: Pitch,
        period: f64,
        variance: f64,
        duration_seconds: f64,
    ) -> KalmanState {
        match tracker {
            Some(current) if current.locked == pitch => {
                current.update(period, variance);
                current.state
            }
            _ => {
                if let Some(previous) = tracker.as_ref() {
                    log::debug!("Pitch lock moved from {} to {}", previous.locked, pitch);
                }
                let fresh = KalmanTracker::lock(pitch, period, variance, duration_seconds);
                let state = fresh.state;
                *tracker = Some(fresh);
                state
            }
        }
    }
}
