//! # Audio Capture Module
//!
//! Frames, the pull-style capture interface the worker reads from, and the
//! CPAL (Cross-Platform Audio Library) microphone implementation of it.
//!
//! ## Features
//! - Automatic input device selection
//! - Mono f32 configuration preferred, multi-channel input down-mixed
//! - Callback chunks assembled into fixed-size frames in arrival order
//! - Scoped start/stop through [`ActiveCapture`]

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::collections::VecDeque;
use std::time::Duration;

/// Sample rate requested from the input device.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// How long `read` waits for the device before giving up.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Callback chunks buffered between the device and the reader. At common
/// callback sizes this holds a few frames of the largest accuracy tier.
const CHUNK_QUEUE_CAPACITY: usize = 256;

/// A block of mono samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Amplitudes, nominally in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Wraps `samples` recorded at `sample_rate` Hz.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples in the frame.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the frame in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Anything that can hand the worker fixed-size frames.
pub trait CaptureSource {
    /// Starts capturing and returns the sample rate in Hz.
    fn start(&mut self) -> Result<u32>;

    /// Blocks until `frame_size` new samples are available.
    ///
    /// Samples are delivered in arrival order and never twice.
    fn read(&mut self, frame_size: usize) -> Result<AudioFrame>;

    /// Stops capturing and releases the device. Must be safe to call twice.
    fn stop(&mut self);
}

/// A started capture source that is stopped when dropped.
pub struct ActiveCapture<C: CaptureSource> {
    source: C,
    sample_rate: u32,
}

impl<C: CaptureSource> ActiveCapture<C> {
    pub fn start(mut source: C) -> Result<Self> {
        let sample_rate = source.start()?;
        log::info!("[CAPTURE] Capture started at {} Hz", sample_rate);
        Ok(Self {
            source,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn read(&mut self, frame_size: usize) -> Result<AudioFrame> {
        self.source.read(frame_size)
    }
}

impl<C: CaptureSource> Drop for ActiveCapture<C> {
    fn drop(&mut self) {
        self.source.stop();
        log::info!("[CAPTURE] Capture stopped");
    }
}

/// Microphone capture through the default CPAL input device.
///
/// The stream is not `Send` on every platform, so a `MicCapture` must be
/// created on the thread that reads from it.
pub struct MicCapture {
    stream: Option<cpal::Stream>,
    chunks: Option<Receiver<Vec<f32>>>,
    pending: VecDeque<f32>,
    sample_rate: u32,
}

impl MicCapture {
    pub fn new() -> Self {
        Self {
            stream: None,
            chunks: None,
            pending: VecDeque::new(),
            sample_rate: TARGET_SAMPLE_RATE,
        }
    }
}

impl Default for MicCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MicCapture {
    fn start(&mut self) -> Result<u32> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        log::info!("[CAPTURE] Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let rate = TARGET_SAMPLE_RATE.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(rate))
            .into();
        let channels = config.channels.max(1) as usize;

        log::info!("[CAPTURE] Selected {} Hz, {} channel(s)", rate, channels);

        let (sender, receiver) = crossbeam_channel::bounded::<Vec<f32>>(CHUNK_QUEUE_CAPACITY);
        let err_fn = |err| log::error!("[CAPTURE] An error occurred on the audio stream: {}", err);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                forward_chunk(&sender, downmix(data, channels));
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        self.pending.clear();
        self.stream = Some(stream);
        self.chunks = Some(receiver);
        self.sample_rate = rate;
        Ok(rate)
    }

    fn read(&mut self, frame_size: usize) -> Result<AudioFrame> {
        let chunks = self
            .chunks
            .as_ref()
            .ok_or_else(|| anyhow!("Capture has not been started"))?;

        while self.pending.len() < frame_size {
            match chunks.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(anyhow!("No audio received for {:?}", READ_TIMEOUT));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("Audio stream closed"));
                }
            }
        }

        let samples = self.pending.drain(..frame_size).collect();
        Ok(AudioFrame::new(samples, self.sample_rate))
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("[CAPTURE] Error pausing stream: {}", e);
            }
            drop(stream);
        }
        self.chunks = None;
        self.pending.clear();
    }
}

/// Hands a callback chunk to the reader without blocking the audio thread.
///
/// # Returns
/// `false` when the chunk was dropped because the reader is behind or gone
fn forward_chunk(sender: &Sender<Vec<f32>>, chunk: Vec<f32>) -> bool {
    match sender.try_send(chunk) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            log::warn!("[CAPTURE] Analysis falling behind, dropping audio chunk");
            false
        }
        // The capture is being torn down.
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Averages interleaved channels into a single mono channel.
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Picks the f32 input configuration closest to `target_rate`, preferring
/// mono over multi-channel.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let covers = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let rate_distance = if covers { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 1, rate_distance)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 44100], 44100);
        assert!((frame.duration_seconds() - 1.0).abs() < 1e-12);
        assert_eq!(frame.len(), 44100);
    }

    #[test]
    fn test_downmix_averages_channels() {
        assert_eq!(downmix(&[1.0, 3.0, -1.0, 1.0], 2), vec![2.0, 0.0]);
        assert_eq!(downmix(&[0.5, 0.25], 1), vec![0.5, 0.25]);
    }

    #[test]
    fn test_full_chunk_queue_drops_newest() {
        let (sender, receiver) = crossbeam_channel::bounded(2);
        assert!(forward_chunk(&sender, vec![1.0]));
        assert!(forward_chunk(&sender, vec![2.0]));
        assert!(!forward_chunk(&sender, vec![3.0]));

        assert_eq!(receiver.try_recv().unwrap(), vec![1.0]);
        assert_eq!(receiver.try_recv().unwrap(), vec![2.0]);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_closed_chunk_queue_is_ignored() {
        let (sender, receiver) = crossbeam_channel::bounded(2);
        drop(receiver);
        assert!(!forward_chunk(&sender, vec![1.0]));
    }

    struct CountingSource {
        stops: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl CaptureSource for CountingSource {
        fn start(&mut self) -> Result<u32> {
            Ok(8000)
        }

        fn read(&mut self, frame_size: usize) -> Result<AudioFrame> {
            Ok(AudioFrame::new(vec![0.0; frame_size], 8000))
        }

        fn stop(&mut self) {
            self.stops.set(self.stops.get() + 1);
        }
    }

    #[test]
    fn test_active_capture_stops_on_drop() {
        let stops = std::rc::Rc::new(std::cell::Cell::new(0));
        {
            let mut capture = ActiveCapture::start(CountingSource { stops: stops.clone() }).unwrap();
            assert_eq!(capture.sample_rate(), 8000);
            assert_eq!(capture.read(16).unwrap().len(), 16);
            assert_eq!(stops.get(), 0);
        }
        assert_eq!(stops.get(), 1);
    }
}
