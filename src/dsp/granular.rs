use std::f32::consts::{FRAC_PI_4, PI};

use rand::{rngs::SmallRng, Rng, SeedableRng};

/*
Granular Layer
==============

A cloud of short windowed snippets ("grains") read out of a loaded sample
buffer and summed on top of the filtered oscillators.

  rate        grains started per second
  duration    grain length in seconds
  position    where in the buffer grains start (0.0 = start, 1.0 = end)
  pitch       playback ratio of each grain (2.0 = one octave up)
  *variation  random spread applied per grain to position / pitch /
              duration / pan

Grains live in a fixed pool. When every slot is busy the new grain is
dropped rather than allocated, so `process` never touches the heap.

Swapping the source buffer kills every running grain (their read heads
point into the old buffer) and hands the old buffer back to the caller,
who is responsible for dropping it off the audio thread.
*/

pub const MAX_GRAINS: usize = 32;

const MIN_RATE: f32 = 0.1;
const MAX_RATE: f32 = 200.0;
const MIN_DURATION: f32 = 0.005;
const MAX_DURATION: f32 = 2.0;
const MIN_PITCH: f32 = 0.125;
const MAX_PITCH: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrainWindow {
    Hann,
    Triangle,
    Rectangle,
    Gaussian,
}

impl GrainWindow {
    pub fn from_index(index: i32) -> Self {
        match index {
            i32::MIN..=0 => GrainWindow::Hann,
            1 => GrainWindow::Triangle,
            2 => GrainWindow::Rectangle,
            _ => GrainWindow::Gaussian,
        }
    }

    /// Window gain at `t` in 0.0 - 1.0 through the grain.
    #[inline]
    fn gain(self, t: f32) -> f32 {
        match self {
            GrainWindow::Hann => 0.5 - 0.5 * (2.0 * PI * t).cos(),
            GrainWindow::Triangle => 1.0 - (2.0 * t - 1.0).abs(),
            GrainWindow::Rectangle => 1.0,
            GrainWindow::Gaussian => {
                let x = (t - 0.5) / 0.15;
                (-0.5 * x * x).exp()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Grain {
    active: bool,
    read_pos: f32,
    increment: f32,
    age: u32,
    length: u32,
    gain_l: f32,
    gain_r: f32,
}

pub struct GranularSynth {
    sample_rate: f32,
    buffer: Vec<f32>,
    grains: [Grain; MAX_GRAINS],
    rng: SmallRng,
    samples_to_next_grain: f32,

    active: bool,
    rate: f32,
    duration: f32,
    position: f32,
    pitch: f32,
    amplitude: f32,
    position_variation: f32,
    pitch_variation: f32,
    duration_variation: f32,
    pan: f32,
    pan_variation: f32,
    window: GrainWindow,
}

impl GranularSynth {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate.max(1.0),
            buffer: Vec::new(),
            grains: [Grain::default(); MAX_GRAINS],
            rng: SmallRng::seed_from_u64(0x6A41),
            samples_to_next_grain: 0.0,

            active: false,
            rate: 20.0,
            duration: 0.1,
            position: 0.0,
            pitch: 1.0,
            amplitude: 0.5,
            position_variation: 0.0,
            pitch_variation: 0.0,
            duration_variation: 0.0,
            pan: 0.0,
            pan_variation: 0.0,
            window: GrainWindow::Hann,
        }
    }

    /// Replace the source buffer and return the previous one.
    pub fn set_buffer(&mut self, buffer: Vec<f32>) -> Vec<f32> {
        for grain in &mut self.grains {
            grain.active = false;
        }
        self.samples_to_next_grain = 0.0;
        std::mem::replace(&mut self.buffer, buffer)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_rate(&mut self, grains_per_second: f32) {
        if grains_per_second.is_finite() {
            self.rate = grains_per_second.clamp(MIN_RATE, MAX_RATE);
        }
    }

    pub fn set_duration(&mut self, seconds: f32) {
        if seconds.is_finite() {
            self.duration = seconds.clamp(MIN_DURATION, MAX_DURATION);
        }
    }

    pub fn set_position(&mut self, position: f32) {
        set_unit(&mut self.position, position);
    }

    pub fn set_pitch(&mut self, ratio: f32) {
        if ratio.is_finite() {
            self.pitch = ratio.clamp(MIN_PITCH, MAX_PITCH);
        }
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        set_unit(&mut self.amplitude, amplitude);
    }

    pub fn set_position_variation(&mut self, amount: f32) {
        set_unit(&mut self.position_variation, amount);
    }

    pub fn set_pitch_variation(&mut self, amount: f32) {
        set_unit(&mut self.pitch_variation, amount);
    }

    pub fn set_duration_variation(&mut self, amount: f32) {
        set_unit(&mut self.duration_variation, amount);
    }

    pub fn set_pan(&mut self, pan: f32) {
        if pan.is_finite() {
            self.pan = pan.clamp(-1.0, 1.0);
        }
    }

    pub fn set_pan_variation(&mut self, amount: f32) {
        set_unit(&mut self.pan_variation, amount);
    }

    pub fn set_window(&mut self, window: GrainWindow) {
        self.window = window;
    }

    pub fn window(&self) -> GrainWindow {
        self.window
    }

    pub fn active_grains(&self) -> usize {
        self.grains.iter().filter(|g| g.active).count()
    }

    pub fn process(&mut self) -> (f32, f32) {
        if !self.active || self.buffer.is_empty() {
            return (0.0, 0.0);
        }

        self.samples_to_next_grain -= 1.0;
        if self.samples_to_next_grain <= 0.0 {
            self.spawn_grain();
            self.samples_to_next_grain += self.sample_rate / self.rate;
        }

        let len = self.buffer.len();
        let mut out_l = 0.0;
        let mut out_r = 0.0;

        for grain in self.grains.iter_mut().filter(|g| g.active) {
            let t = grain.age as f32 / grain.length as f32;
            let window = self.window.gain(t);

            let index = grain.read_pos as usize % len;
            let next = (index + 1) % len;
            let frac = grain.read_pos.fract();
            let sample = self.buffer[index] + (self.buffer[next] - self.buffer[index]) * frac;

            let value = sample * window;
            out_l += value * grain.gain_l;
            out_r += value * grain.gain_r;

            grain.read_pos += grain.increment;
            if grain.read_pos >= len as f32 {
                grain.read_pos -= len as f32;
            }
            grain.age += 1;
            if grain.age >= grain.length {
                grain.active = false;
            }
        }

        (out_l * self.amplitude, out_r * self.amplitude)
    }

    fn spawn_grain(&mut self) {
        let Some(slot) = self.grains.iter().position(|g| !g.active) else {
            return;
        };

        let position = (self.position + self.spread(self.position_variation)).clamp(0.0, 1.0);
        let pitch = (self.pitch * (1.0 + self.spread(self.pitch_variation)))
            .clamp(MIN_PITCH, MAX_PITCH);
        let duration = (self.duration * (1.0 + self.spread(self.duration_variation)))
            .clamp(MIN_DURATION, MAX_DURATION);
        let pan = (self.pan + self.spread(self.pan_variation)).clamp(-1.0, 1.0);

        let len = self.buffer.len();
        let angle = (pan + 1.0) * FRAC_PI_4;
        self.grains[slot] = Grain {
            active: true,
            read_pos: position * (len - 1) as f32,
            increment: pitch,
            age: 0,
            length: ((duration * self.sample_rate) as u32).max(1),
            gain_l: angle.cos(),
            gain_r: angle.sin(),
        };
    }

    #[inline]
    fn spread(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 {
            0.0
        } else {
            self.rng.gen_range(-amount..=amount)
        }
    }
}

fn set_unit(field: &mut f32, value: f32) {
    if value.is_finite() {
        *field = value.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    fn loaded() -> GranularSynth {
        let mut granular = GranularSynth::new(SAMPLE_RATE);
        granular.set_buffer(vec![1.0; 500]);
        granular
    }

    #[test]
    fn inactive_layer_is_silent() {
        let mut granular = loaded();
        for _ in 0..1000 {
            assert_eq!(granular.process(), (0.0, 0.0));
        }
    }

    #[test]
    fn empty_buffer_is_silent_even_when_active() {
        let mut granular = GranularSynth::new(SAMPLE_RATE);
        granular.set_active(true);
        for _ in 0..1000 {
            assert_eq!(granular.process(), (0.0, 0.0));
        }
    }

    #[test]
    fn active_layer_produces_grains() {
        let mut granular = loaded();
        granular.set_active(true);
        granular.set_amplitude(1.0);

        let mut peak = 0.0f32;
        for _ in 0..1000 {
            let (l, r) = granular.process();
            assert!(l.is_finite() && r.is_finite());
            peak = peak.max(l.abs()).max(r.abs());
        }
        assert!(peak > 0.1, "expected audible grains, peak {peak}");
    }

    #[test]
    fn grain_pool_never_exceeds_capacity() {
        let mut granular = loaded();
        granular.set_active(true);
        granular.set_rate(MAX_RATE);
        granular.set_duration(MAX_DURATION);
        for _ in 0..500 {
            granular.process();
        }
        assert_eq!(granular.active_grains(), MAX_GRAINS);
        for _ in 0..5000 {
            granular.process();
            assert!(granular.active_grains() <= MAX_GRAINS);
        }
    }

    #[test]
    fn set_buffer_returns_previous_and_kills_grains() {
        let mut granular = loaded();
        granular.set_active(true);
        for _ in 0..200 {
            granular.process();
        }
        assert!(granular.active_grains() > 0);

        let old = granular.set_buffer(vec![0.5; 10]);
        assert_eq!(old.len(), 500);
        assert_eq!(granular.buffer_len(), 10);
        assert_eq!(granular.active_grains(), 0);
    }

    #[test]
    fn windows_are_zero_at_edges_except_rectangle() {
        for window in [GrainWindow::Hann, GrainWindow::Triangle] {
            assert!(window.gain(0.0).abs() < 1e-6);
            assert!((window.gain(0.5) - 1.0).abs() < 1e-6);
        }
        assert_eq!(GrainWindow::Rectangle.gain(0.0), 1.0);
        assert!(GrainWindow::Gaussian.gain(0.0) < 0.01);
        assert_eq!(GrainWindow::from_index(2), GrainWindow::Rectangle);
    }
}
