use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::dsp::smoothing::SmoothedParameter;

/*
| type              | index | passes          | rejects      |
| ----------------- | ----- | --------------- | ------------ |
| low-pass          | 0     | below cutoff    | above cutoff |
| high-pass         | 1     | above cutoff    | below cutoff |
| band-pass         | 2     | around cutoff   | outside      |
| notch / band-stop | 3     | outside         | around       |
*/

const MIN_CUTOFF_HZ: f32 = 20.0;
/// Resonance of 1.0 would make k = 0, an undamped (self-oscillating) filter.
const MAX_RESONANCE: f32 = 0.98;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

impl FilterType {
    /// Map a parameter value onto a response. Out-of-range indices clamp.
    pub fn from_index(index: i32) -> Self {
        match index {
            i32::MIN..=0 => FilterType::LowPass,
            1 => FilterType::HighPass,
            2 => FilterType::BandPass,
            _ => FilterType::Notch,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            FilterType::LowPass => 0,
            FilterType::HighPass => 1,
            FilterType::BandPass => 2,
            FilterType::Notch => 3,
        }
    }
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

/// Single-channel topology-preserving state-variable filter core.
#[derive(Debug, Clone, Default)]
pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory
}

impl SVFilter {
    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> FilterOutputs {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

/// Stereo filter module with internally smoothed cutoff and resonance.
///
/// Setters only move targets; `process` glides toward them one sample at a
/// time, so sweeping the cutoff from a MIDI knob never zippers.
pub struct Filter {
    left: SVFilter,
    right: SVFilter,
    cutoff: SmoothedParameter,
    resonance: SmoothedParameter,
    filter_type: FilterType,
    sample_rate: f32,
    // Coefficients cached for the current smoothed values
    g: f32,
    k: f32,
}

impl Filter {
    pub fn new(filter_type: FilterType, sample_rate: f32, smoothing_ms: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let mut filter = Self {
            left: SVFilter::default(),
            right: SVFilter::default(),
            cutoff: SmoothedParameter::new(1000.0, smoothing_ms, sample_rate),
            resonance: SmoothedParameter::new(0.0, smoothing_ms, sample_rate),
            filter_type,
            sample_rate,
            g: 0.0,
            k: 2.0,
        };
        filter.update_coefficients();
        filter
    }

    pub fn lowpass(cutoff_hz: f32, sample_rate: f32) -> Self {
        let mut filter = Self::new(FilterType::LowPass, sample_rate, 0.0);
        filter.set_cutoff(cutoff_hz);
        filter.snap();
        filter
    }

    /// Jump both smoothers onto their targets. Used when building defaults.
    pub fn snap(&mut self) {
        self.cutoff.set_current_and_target(self.cutoff.target());
        self.resonance.set_current_and_target(self.resonance.target());
        self.update_coefficients();
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        if cutoff_hz.is_finite() {
            self.cutoff.set_target(cutoff_hz.clamp(MIN_CUTOFF_HZ, self.max_cutoff()));
        }
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        if resonance.is_finite() {
            self.resonance.set_target(resonance.clamp(0.0, MAX_RESONANCE));
        }
    }

    pub fn set_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn cutoff_target(&self) -> f32 {
        self.cutoff.target()
    }

    pub fn resonance_target(&self) -> f32 {
        self.resonance.target()
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    fn max_cutoff(&self) -> f32 {
        self.sample_rate * 0.49
    }

    #[inline]
    fn update_coefficients(&mut self) {
        let wd = TAU * self.cutoff.current();
        let wa = (2.0 * self.sample_rate) * (wd / (2.0 * self.sample_rate)).tan();
        self.g = wa / (2.0 * self.sample_rate);
        self.k = 2.0 - (2.0 * self.resonance.current());
    }

    /// Filter one stereo frame.
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        if !(self.cutoff.is_settled() && self.resonance.is_settled()) {
            self.cutoff.advance();
            self.resonance.advance();
            self.update_coefficients();
        }

        let (k, g) = (self.k, self.g);
        let l = self.left.next_sample(left, k, g);
        let r = self.right.next_sample(right, k, g);
        (self.select(&l), self.select(&r))
    }

    #[inline]
    fn select(&self, outputs: &FilterOutputs) -> f32 {
        match self.filter_type {
            FilterType::LowPass => outputs.lowpass,
            FilterType::HighPass => outputs.highpass,
            FilterType::BandPass => outputs.bandpass,
            FilterType::Notch => outputs.notch,
        }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
