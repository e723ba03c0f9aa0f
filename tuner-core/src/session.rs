//! # Detector Session
//!
//! The background worker that pulls frames from a capture source, runs them
//! through a [`PitchDetector`] and publishes the latest result.
//!
//! ## Architecture
//! - **Worker thread**: owns the capture source, the detector and its Kalman
//!   lock; nothing else touches them
//! - **Settings**: independent atomics written by the UI and polled once per
//!   frame; a changed snapshot rebuilds the detector
//! - **Results**: a single-slot channel that always holds the newest result
//! - **Cancellation**: a shared flag checked once per iteration

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::{ActiveCapture, CaptureSource};
use crate::config::TunerConfig;
use crate::detector::{PitchDetector, PitchError};

/// Tunable values shared between the UI and the worker.
///
/// Each field is read and written on its own; a snapshot may mix an old and
/// a new value for one frame, which only delays a rebuild by that frame.
#[derive(Debug)]
pub struct SharedSettings {
    reference_hz: AtomicU32,
    threshold_bits: AtomicU64,
    frame_size: AtomicUsize,
}

impl SharedSettings {
    pub fn new(config: TunerConfig) -> Self {
        Self {
            reference_hz: AtomicU32::new(config.reference_hz),
            threshold_bits: AtomicU64::new(config.detection_threshold.to_bits()),
            frame_size: AtomicUsize::new(config.frame_size),
        }
    }

    pub fn set_reference_hz(&self, hz: u32) {
        self.reference_hz.store(hz, Ordering::Relaxed);
    }

    pub fn set_detection_threshold(&self, threshold: f64) {
        self.threshold_bits.store(threshold.to_bits(), Ordering::Relaxed);
    }

    pub fn set_frame_size(&self, frame_size: usize) {
        self.frame_size.store(frame_size, Ordering::Relaxed);
    }

    /// Applies every field of `config`.
    pub fn apply(&self, config: TunerConfig) {
        self.set_reference_hz(config.reference_hz);
        self.set_detection_threshold(config.detection_threshold);
        self.set_frame_size(config.frame_size);
    }

    pub fn snapshot(&self) -> TunerConfig {
        TunerConfig {
            reference_hz: self.reference_hz.load(Ordering::Relaxed),
            detection_threshold: f64::from_bits(self.threshold_bits.load(Ordering::Relaxed)),
            frame_size: self.frame_size.load(Ordering::Relaxed),
        }
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(TunerConfig::default())
    }
}

/// Writing half of a single-slot "latest value" channel.
///
/// Publishing into a full slot replaces the stale value, so a slow reader
/// only ever sees the most recent result.
#[derive(Clone)]
pub struct LatestPublisher<T> {
    sender: Sender<T>,
    stale: Receiver<T>,
}

/// Creates a single-slot channel.
pub fn latest_slot<T>() -> (LatestPublisher<T>, Receiver<T>) {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    let publisher = LatestPublisher {
        sender,
        stale: receiver.clone(),
    };
    (publisher, receiver)
}

impl<T> LatestPublisher<T> {
    pub fn publish(&self, value: T) {
        let mut value = value;
        loop {
            match self.sender.try_send(value) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.stale.try_recv();
                    value = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Runs the detection loop until `running` is cleared or an error occurs.
///
/// The capture source is started before the loop and stopped on every exit
/// path. Each iteration rebuilds the detector if the settings snapshot
/// changed, then reads, analyses and publishes exactly one frame.
pub fn run_worker<C: CaptureSource>(
    source: C,
    settings: &SharedSettings,
    running: &AtomicBool,
    publisher: &LatestPublisher<Option<PitchError>>,
) -> Result<()> {
    let mut capture = ActiveCapture::start(source)?;

    let mut config = settings.snapshot();
    let mut detector = PitchDetector::new(config)?;
    log::info!("[WORKER] Entering detection loop at {} Hz", capture.sample_rate());

    while running.load(Ordering::Relaxed) {
        let latest = settings.snapshot();
        if latest != config {
            log::info!(
                "[WORKER] Settings changed (A4={} Hz, threshold={:.3}, frame={}), rebuilding detector",
                latest.reference_hz,
                latest.detection_threshold,
                latest.frame_size
            );
            detector = PitchDetector::new(latest)?;
            config = latest;
        }

        let frame = capture.read(config.frame_size)?;
        let detection = detector.detect(&frame)?;
        publisher.publish(detection);
    }

    log::info!("[WORKER] Detection loop finished");
    Ok(())
}

/// A running worker thread and the handles needed to steer it.
pub struct TunerSession {
    settings: Arc<SharedSettings>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TunerSession {
    /// Spawns the worker and returns the session with the results receiver.
    ///
    /// `make_source` runs on the worker thread, so capture sources that are
    /// not `Send` can still be used.
    pub fn spawn<C, F>(make_source: F, settings: Arc<SharedSettings>) -> (Self, Receiver<Option<PitchError>>)
    where
        C: CaptureSource,
        F: FnOnce() -> Result<C> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (publisher, results) = latest_slot();

        let worker_settings = Arc::clone(&settings);
        let worker_running = Arc::clone(&running);
        let handle = thread::spawn(move || {
            log::info!("[WORKER] Starting worker thread...");
            let outcome = make_source()
                .and_then(|source| run_worker(source, &worker_settings, &worker_running, &publisher));
            if let Err(e) = &outcome {
                log::error!("[WORKER] Worker stopped with error: {:#}", e);
            }
            worker_running.store(false, Ordering::Relaxed);
            outcome
        });

        let session = Self {
            settings,
            running,
            handle: Some(handle),
        };
        (session, results)
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// False once the worker has been cancelled or has stopped on its own.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Requests cancellation and waits for the worker to release capture.
    pub fn stop(mut self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("Worker thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for TunerSession {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
