//! Block spectrum analyzer
//!
//! Windowed FFT over the tail of each rendered block, folded into three
//! bands plus a dominant-frequency and a peak reading.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::{AnalysisReadings, AnalysisSnapshot};
use crate::error::EngineError;

pub const MIN_FFT_SIZE: usize = 64;
pub const MAX_FFT_SIZE: usize = 32_768;

/// Upper edge of the bass band, Hz.
const BASS_MAX_HZ: f32 = 250.0;
/// Upper edge of the mid band, Hz. Everything above is "high".
const MID_MAX_HZ: f32 = 4_000.0;

pub fn is_valid_fft_size(fft_size: usize) -> bool {
    fft_size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size)
}

/*
Pipeline (per block)
--------------------

    interleaved block
          │  mono mix (L+R)/2, tail fft_size frames, zero pad if short
          ▼
    × Hann window
          │
          ▼
    complex FFT (in place)
          │  |X[k]| * 2/N   (DC and Nyquist: 1/N)
          ▼
    magnitudes[0 ..= N/2] ──→ band averages, argmax bin

The amplitude reading bypasses the FFT: it is the largest absolute mono
sample in the whole block.

Bin k sits at k * sample_rate / N Hz. A bin belongs to the first band
whose upper edge it does not exceed. Band averages divide by the number of
bins that actually landed in the band; an empty band reads 0.
*/

pub struct SpectrumAnalyzer {
    fft_size: usize,
    sample_rate: f32,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    readings: Arc<AnalysisReadings>,
}

impl SpectrumAnalyzer {
    /// Plan the FFT and allocate every buffer up front. `fft_size` must
    /// already be validated with `is_valid_fft_size`.
    pub fn new(
        fft_size: usize,
        sample_rate: f32,
        readings: Arc<AnalysisReadings>,
    ) -> Result<Self, EngineError> {
        if !is_valid_fft_size(fft_size) {
            return Err(EngineError::AnalysisAllocation { fft_size });
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let denom = (fft_size - 1) as f32;
        let mut window = filled(fft_size, 0.0f32, fft_size)?;
        for (i, w) in window.iter_mut().enumerate() {
            *w = 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos());
        }

        let zero = Complex::new(0.0, 0.0);
        let buffer = filled(fft_size, zero, fft_size)?;
        let scratch = filled(fft.get_inplace_scratch_len(), zero, fft_size)?;
        let magnitudes = filled(fft_size / 2 + 1, 0.0f32, fft_size)?;

        Ok(Self {
            fft_size,
            sample_rate: sample_rate.max(1.0),
            window,
            fft,
            buffer,
            scratch,
            magnitudes,
            readings,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Width of one bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate / self.fft_size as f32
    }

    /// Magnitude spectrum from the most recent `analyze`, bins 0 ..= N/2.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Analyze one interleaved block and publish the readings.
    pub fn analyze(&mut self, block: &[f32], channels: usize) {
        let channels = channels.max(1);
        let frames = block.len() / channels;
        if frames == 0 {
            self.readings.clear();
            return;
        }

        let mono = |frame: usize| -> f32 {
            let base = frame * channels;
            if channels == 1 {
                block[base]
            } else {
                (block[base] + block[base + 1]) * 0.5
            }
        };

        let amplitude = (0..frames).fold(0.0f32, |peak, i| peak.max(mono(i).abs()));

        // Tail of the block, zero padded when it is shorter than the window
        let copied = frames.min(self.fft_size);
        let start = frames - copied;
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < copied { mono(start + i) } else { 0.0 };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let n = self.fft_size as f32;
        let half = self.fft_size / 2;
        for (k, magnitude) in self.magnitudes.iter_mut().enumerate() {
            let scale = if k == 0 || k == half { 1.0 / n } else { 2.0 / n };
            *magnitude = self.buffer[k].norm() * scale;
        }

        let bin_width = self.bin_width();
        let mut sums = [0.0f64; 3];
        let mut counts = [0usize; 3];
        let mut dominant_bin = 0;
        let mut dominant_magnitude = f32::MIN;

        for (k, &magnitude) in self.magnitudes.iter().enumerate() {
            if magnitude > dominant_magnitude {
                dominant_magnitude = magnitude;
                dominant_bin = k;
            }

            let frequency = k as f32 * bin_width;
            let band = if frequency <= BASS_MAX_HZ {
                0
            } else if frequency <= MID_MAX_HZ {
                1
            } else {
                2
            };
            sums[band] += magnitude as f64;
            counts[band] += 1;
        }

        let average = |band: usize| {
            if counts[band] > 0 {
                sums[band] / counts[band] as f64
            } else {
                0.0
            }
        };

        self.readings.publish(AnalysisSnapshot {
            bass: average(0),
            mid: average(1),
            high: average(2),
            amplitude: amplitude as f64,
            dominant_frequency: (dominant_bin as f32 * bin_width) as f64,
        });
    }
}

fn filled<T: Clone>(len: usize, value: T, fft_size: usize) -> Result<Vec<T>, EngineError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| EngineError::AnalysisAllocation { fft_size })?;
    buffer.resize(len, value);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44_100.0;

    fn analyzer(fft_size: usize) -> (SpectrumAnalyzer, Arc<AnalysisReadings>) {
        let readings = Arc::new(AnalysisReadings::new());
        let analyzer = SpectrumAnalyzer::new(fft_size, SAMPLE_RATE, readings.clone()).unwrap();
        (analyzer, readings)
    }

    fn sine_block(freq: f32, frames: usize, channels: usize) -> Vec<f32> {
        let mut block = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let s = (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin() * 0.8;
            for _ in 0..channels {
                block.push(s);
            }
        }
        block
    }

    #[test]
    fn sine_dominant_frequency_within_one_bin() {
        let (mut analyzer, readings) = analyzer(2048);
        for &freq in &[110.0f32, 1_000.0, 5_500.0] {
            analyzer.analyze(&sine_block(freq, 2048, 2), 2);
            let dominant = readings.dominant_frequency();
            assert!(
                (dominant - freq as f64).abs() <= analyzer.bin_width() as f64,
                "expected ~{freq} Hz, got {dominant}"
            );
        }
    }

    #[test]
    fn full_scale_sine_magnitude_is_amplitude_correct() {
        let (mut analyzer, _) = analyzer(4096);
        // Exactly on bin 64, so no leakage beyond the Hann main lobe
        let freq = 64.0 * SAMPLE_RATE / 4096.0;
        analyzer.analyze(&sine_block(freq, 4096, 1), 1);

        // Hann coherent gain is 0.5
        let peak = analyzer.magnitudes()[64];
        assert!((peak - 0.8 * 0.5).abs() < 0.01, "peak magnitude {peak}");
    }

    #[test]
    fn bands_follow_the_tone() {
        let (mut analyzer, readings) = analyzer(2048);

        analyzer.analyze(&sine_block(100.0, 2048, 2), 2);
        let low = readings.snapshot();
        assert!(low.bass > low.mid && low.bass > low.high, "{low:?}");

        analyzer.analyze(&sine_block(9_000.0, 2048, 2), 2);
        let high = readings.snapshot();
        assert!(high.high > high.bass, "{high:?}");
    }

    #[test]
    fn amplitude_is_block_peak() {
        let (mut analyzer, readings) = analyzer(1024);
        let mut block = vec![0.0f32; 512];
        block[100] = -0.6;
        block[300] = 0.4;
        analyzer.analyze(&block, 1);
        assert!((readings.amplitude() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn short_block_is_zero_padded() {
        let (mut analyzer, readings) = analyzer(2048);
        analyzer.analyze(&sine_block(1_000.0, 512, 2), 2);
        let dominant = readings.dominant_frequency();
        // Four times coarser effective resolution once padded
        assert!((dominant - 1_000.0).abs() < 4.0 * analyzer.bin_width() as f64);
    }

    #[test]
    fn silence_reads_zero() {
        let (mut analyzer, readings) = analyzer(256);
        analyzer.analyze(&sine_block(440.0, 256, 1), 1);
        analyzer.analyze(&vec![0.0; 256], 1);
        let snapshot = readings.snapshot();
        assert_eq!(snapshot.amplitude, 0.0);
        assert_eq!(snapshot.bass, 0.0);
        assert_eq!(snapshot.high, 0.0);
    }

    #[test]
    fn fft_size_validation() {
        assert!(is_valid_fft_size(2048));
        assert!(!is_valid_fft_size(1000));
        assert!(!is_valid_fft_size(0));
        assert!(!is_valid_fft_size(32));
        assert!(SpectrumAnalyzer::new(1000, SAMPLE_RATE, Arc::new(AnalysisReadings::new())).is_err());
    }
}
