//! Spectral analysis of the rendered output for visualization.

pub mod spectrum;

use std::sync::atomic::{AtomicU64, Ordering};

pub use spectrum::{is_valid_fft_size, SpectrumAnalyzer, MAX_FFT_SIZE, MIN_FFT_SIZE};

/// Helper to store f64 in AtomicU64
#[inline]
fn f64_to_u64(f: f64) -> u64 {
    f.to_bits()
}

/// Helper to load f64 from AtomicU64
#[inline]
fn u64_to_f64(u: u64) -> f64 {
    f64::from_bits(u)
}

/// The five published readings. Written only by the audio thread, read
/// from anywhere. Each value is its own atomic so a reader never sees a
/// torn float, though two readings may come from different blocks.
#[derive(Debug, Default)]
pub struct AnalysisReadings {
    bass: AtomicU64,
    mid: AtomicU64,
    high: AtomicU64,
    amplitude: AtomicU64,
    dominant_frequency: AtomicU64,
}

/// Plain snapshot of `AnalysisReadings`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisSnapshot {
    pub bass: f64,
    pub mid: f64,
    pub high: f64,
    pub amplitude: f64,
    pub dominant_frequency: f64,
}

impl AnalysisReadings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bass(&self) -> f64 {
        u64_to_f64(self.bass.load(Ordering::Relaxed))
    }

    pub fn mid(&self) -> f64 {
        u64_to_f64(self.mid.load(Ordering::Relaxed))
    }

    pub fn high(&self) -> f64 {
        u64_to_f64(self.high.load(Ordering::Relaxed))
    }

    pub fn amplitude(&self) -> f64 {
        u64_to_f64(self.amplitude.load(Ordering::Relaxed))
    }

    pub fn dominant_frequency(&self) -> f64 {
        u64_to_f64(self.dominant_frequency.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            bass: self.bass(),
            mid: self.mid(),
            high: self.high(),
            amplitude: self.amplitude(),
            dominant_frequency: self.dominant_frequency(),
        }
    }

    pub(crate) fn publish(&self, snapshot: AnalysisSnapshot) {
        self.bass.store(f64_to_u64(snapshot.bass), Ordering::Relaxed);
        self.mid.store(f64_to_u64(snapshot.mid), Ordering::Relaxed);
        self.high.store(f64_to_u64(snapshot.high), Ordering::Relaxed);
        self.amplitude
            .store(f64_to_u64(snapshot.amplitude), Ordering::Relaxed);
        self.dominant_frequency
            .store(f64_to_u64(snapshot.dominant_frequency), Ordering::Relaxed);
    }

    pub(crate) fn clear(&self) {
        self.publish(AnalysisSnapshot::default());
    }
}
