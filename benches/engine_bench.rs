//! Benchmarks for the engine's audio path.
//!
//! Run with: cargo bench
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline
//!
//! Benchmark groups:
//!   - engine/*    Whole-block render through `process_audio`
//!   - analysis/*  Spectrum analyzer at several FFT sizes
//!   - dsp/*       Individual stereo modules

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use synther_engine::analysis::{AnalysisReadings, SpectrumAnalyzer};
use synther_engine::dsp::{Filter, FilterType, GranularSynth, Reverb};
use synther_engine::{params, EngineConfig, OfflineBackend, SynthEngine};

/// Common buffer sizes used in audio applications.
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];
const FFT_SIZES: &[usize] = &[512, 2048, 8192];
const SAMPLE_RATE: f32 = 48_000.0;

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/render");

    for &size in BLOCK_SIZES {
        let engine = SynthEngine::with_backend(EngineConfig::default(), Box::new(OfflineBackend::new()));
        engine
            .initialize(SAMPLE_RATE as u32, size as u32, 0.8)
            .expect("offline backend starts");
        engine.note_on(57, 100);
        let mut block = vec![0.0f32; size * 2];

        group.bench_with_input(BenchmarkId::new("held_note", size), &size, |b, _| {
            b.iter(|| engine.process_audio(black_box(&mut block)))
        });

        engine.load_granular_buffer((0..48_000).map(|i| (i as f32 * 0.01).sin()).collect());
        engine.set_parameter(params::GRANULAR_ACTIVE, 1.0, false);
        engine.set_parameter(params::GRANULAR_GRAIN_RATE, 80.0, false);
        group.bench_with_input(BenchmarkId::new("with_granular", size), &size, |b, _| {
            b.iter(|| engine.process_audio(black_box(&mut block)))
        });

        engine.shutdown();
    }

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis/spectrum");
    let readings = Arc::new(AnalysisReadings::new());
    let block: Vec<f32> = (0..1024)
        .flat_map(|i| {
            let s = (i as f32 * 0.07).sin();
            [s, s]
        })
        .collect();

    for &fft_size in FFT_SIZES {
        let mut analyzer = SpectrumAnalyzer::new(fft_size, SAMPLE_RATE, readings.clone())
            .expect("valid fft size");
        group.bench_with_input(BenchmarkId::new("stereo_block", fft_size), &fft_size, |b, _| {
            b.iter(|| analyzer.analyze(black_box(&block), 2))
        });
    }

    group.finish();
}

fn bench_modules(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/stereo");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        let mut filter = Filter::new(FilterType::LowPass, SAMPLE_RATE, 20.0);
        filter.set_cutoff(1200.0);
        group.bench_with_input(BenchmarkId::new("filter", size), &size, |b, _| {
            b.iter(|| {
                for &x in &input {
                    black_box(filter.process(x, x));
                }
            })
        });

        let mut reverb = Reverb::new(SAMPLE_RATE);
        reverb.set_mix(0.3);
        group.bench_with_input(BenchmarkId::new("reverb", size), &size, |b, _| {
            b.iter(|| {
                for &x in &input {
                    black_box(reverb.process(x, x));
                }
            })
        });

        let mut granular = GranularSynth::new(SAMPLE_RATE);
        granular.set_buffer(input.repeat(100));
        granular.set_active(true);
        granular.set_rate(100.0);
        group.bench_with_input(BenchmarkId::new("granular", size), &size, |b, _| {
            b.iter(|| {
                for _ in 0..size {
                    black_box(granular.process());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_engine, bench_analysis, bench_modules);
criterion_main!(benches);
