//! End-to-end tests for the pitch detection pipeline

use std::f64::consts::PI;
use tuner_core::{AudioFrame, PitchDetector, PitchName, PitchTable, TunerConfig};

const SAMPLE_RATE: u32 = 44100;
const FRAME_SIZE: usize = 4096;

fn sine_wave(freq: f64, offset: f64) -> Vec<f32> {
    (0..FRAME_SIZE)
        .map(|i| ((2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin() + offset) as f32)
        .collect()
}

fn new_detector() -> PitchDetector {
    PitchDetector::new(TunerConfig {
        reference_hz: 440,
        detection_threshold: 0.1,
        frame_size: FRAME_SIZE,
    })
    .unwrap()
}

fn run_detection(offset: f64) {
    let cases = [
        (439.0, Some((PitchName::A, 4))),
        (440.0, Some((PitchName::A, 4))),
        (441.0, Some((PitchName::A, 4))),
        (10.0, None),
        (20000.0, None),
    ];

    for (freq, expected) in cases {
        let mut detector = new_detector();
        let frame = AudioFrame::new(sine_wave(freq, offset), SAMPLE_RATE);
        let result = detector.detect(&frame).unwrap();

        match (result, expected) {
            (Some(err), Some((name, octave))) => {
                assert_eq!(err.expected().name, name, "case {} Hz", freq);
                assert_eq!(err.expected().octave, octave, "case {} Hz", freq);
                let relative = (err.actual_freq() - freq).abs() / freq;
                assert!(relative < 1e-3, "case {} Hz measured {}", freq, err.actual_freq());
            }
            (None, None) => {}
            (got, want) => panic!("case {} Hz: got {:?}, expected {:?}", freq, got, want),
        }
    }
}

#[test]
fn test_detect_basic_sine() {
    run_detection(0.0);
}

#[test]
fn test_detect_offset_sine() {
    run_detection(0.2);
}

#[test]
fn test_strong_overtone_resolves_to_fundamental() {
    // Second harmonic at three times the amplitude of the fundamental
    let samples: Vec<f32> = (0..FRAME_SIZE)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            (0.3 * (2.0 * PI * 110.0 * t).sin() + 0.9 * (2.0 * PI * 220.0 * t).sin()) as f32
        })
        .collect();

    let mut detector = new_detector();
    let result = detector
        .detect(&AudioFrame::new(samples, SAMPLE_RATE))
        .unwrap()
        .unwrap();

    assert_eq!(result.expected().name, PitchName::A);
    assert_eq!(result.expected().octave, 2);
    assert!((result.actual_freq() / 110.0 - 1.0).abs() < 1e-3);
}

#[test]
fn test_returns_none_if_input_too_soft() {
    let too_quiet: Vec<f32> = sine_wave(440.0, 0.0).iter().map(|x| 0.01 * x).collect();
    let mut detector = new_detector();
    assert_eq!(detector.detect(&AudioFrame::new(too_quiet, SAMPLE_RATE)), Ok(None));
}

#[test]
fn test_constant_signal_returns_none() {
    let mut detector = new_detector();
    let constant = AudioFrame::new(vec![1.42; FRAME_SIZE], SAMPLE_RATE);
    assert_eq!(detector.detect(&constant), Ok(None));
}

#[test]
fn test_silence_returns_none() {
    let mut detector = new_detector();
    let silence = AudioFrame::new(vec![0.0; FRAME_SIZE], SAMPLE_RATE);
    assert_eq!(detector.detect(&silence), Ok(None));
}

#[test]
fn test_matches_nearest_table_entry_across_range() {
    let table = PitchTable::build(440.0);
    for freq in [82.41, 110.0, 146.83, 196.0, 246.94, 329.63, 523.25, 987.77] {
        let mut detector = new_detector();
        let frame = AudioFrame::new(sine_wave(freq, 0.0), SAMPLE_RATE);
        let err = detector.detect(&frame).unwrap().unwrap();
        assert_eq!(*err.expected(), table.find_closest_pitch(freq), "case {} Hz", freq);
        assert!((err.actual_freq() - freq).abs() / freq < 1e-3, "case {} Hz", freq);
    }
}

#[test]
fn test_reference_frequency_shifts_the_table() {
    let mut detector = PitchDetector::new(TunerConfig {
        reference_hz: 415,
        detection_threshold: 0.1,
        frame_size: FRAME_SIZE,
    })
    .unwrap();
    let frame = AudioFrame::new(sine_wave(415.0, 0.0), SAMPLE_RATE);
    let err = detector.detect(&frame).unwrap().unwrap();
    assert_eq!(err.expected().name, PitchName::A);
    assert_eq!(err.expected().freq, 415.0);
    assert!(err.error_in_cents().abs() < 2.0);
}

#[test]
fn test_relock_uses_fresh_measurement() {
    let a4 = AudioFrame::new(sine_wave(440.0, 0.0), SAMPLE_RATE);
    let a3 = AudioFrame::new(sine_wave(220.0, 0.0), SAMPLE_RATE);

    let mut detector = new_detector();
    let first = detector.detect(&a4).unwrap().unwrap();
    let second = detector.detect(&a3).unwrap().unwrap();

    let mut fresh = new_detector();
    let raw = fresh.detect(&a3).unwrap().unwrap();

    assert_eq!(first.expected().octave, 4);
    assert_eq!(second.expected().octave, 3);
    assert_eq!(second.variance(), raw.variance());
    assert_eq!(second.period(), raw.period());
}

#[test]
fn test_same_pitch_is_smoothed() {
    let frame = AudioFrame::new(sine_wave(440.0, 0.0), SAMPLE_RATE);
    let mut detector = new_detector();
    let first = detector.detect(&frame).unwrap().unwrap();
    let second = detector.detect(&frame).unwrap().unwrap();

    assert_eq!(first.expected(), second.expected());
    assert!(second.variance() <= first.variance());
    assert!((second.actual_freq() - 440.0).abs() / 440.0 < 1e-3);
}
