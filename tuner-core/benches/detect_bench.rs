use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::f64::consts::PI;
use std::hint::black_box;
use tuner_core::{Accuracy, AudioFrame, PitchDetector, TunerConfig};

const SAMPLE_RATE: u32 = 44100;

fn sine_frame(freq: f64, len: usize) -> AudioFrame {
    let samples = (0..len)
        .map(|i| (2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin() as f32)
        .collect();
    AudioFrame::new(samples, SAMPLE_RATE)
}

pub fn detect_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");
    for accuracy in Accuracy::ALL {
        let frame = sine_frame(196.0, accuracy.sample_size());
        let mut detector = match PitchDetector::new(TunerConfig::new(440, 0.1, accuracy)) {
            Ok(detector) => detector,
            Err(e) => panic!("cannot build detector: {}", e),
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(accuracy.label()),
            &frame,
            |b, frame| b.iter(|| detector.detect(black_box(frame))),
        );
    }
    group.finish();
}

criterion_group!(benches, detect_benchmark);
criterion_main!(benches);
