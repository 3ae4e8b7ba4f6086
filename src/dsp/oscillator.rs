use std::f32::consts::{FRAC_PI_4, TAU};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dsp::smoothing::SmoothedParameter;

/*
Oscillator Slots
================

The engine mixes a fixed list of oscillator slots. Each slot is addressed by
parameter id `100 + slot * 10 + field`, so the router only needs the setters
on the `Oscillator` trait below and never looks at the concrete type.

Wavetable selection is a capability, not a subtype: `wavetable_mut` returns
`Some` only for slots that can morph through tables. Plain slots keep the
default `None` and wavetable parameters become no-ops for them.

Per-sample order inside `process`:

    volume.advance()  →  phase += freq * detune * bend / sr  →  shape(phase) * volume

Frequency, detune and bend combine multiplicatively:

    f = base * 2^(detune_cents / 1200) * pitch_ratio
*/

const TABLE_LEN: usize = 2048;
const FRAMES_PER_TABLE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OscillatorWaveform {
    Sine,
    Saw,
    Square,
    Triangle,
    Noise,
}

impl OscillatorWaveform {
    pub fn from_index(index: i32) -> Self {
        match index {
            i32::MIN..=0 => OscillatorWaveform::Sine,
            1 => OscillatorWaveform::Saw,
            2 => OscillatorWaveform::Square,
            3 => OscillatorWaveform::Triangle,
            _ => OscillatorWaveform::Noise,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            OscillatorWaveform::Sine => 0,
            OscillatorWaveform::Saw => 1,
            OscillatorWaveform::Square => 2,
            OscillatorWaveform::Triangle => 3,
            OscillatorWaveform::Noise => 4,
        }
    }
}

/// Contract every oscillator slot fulfils for the engine.
pub trait Oscillator: Send {
    /// Produce the next sample, already scaled by the slot volume.
    fn process(&mut self) -> f32;

    fn set_waveform(&mut self, waveform: OscillatorWaveform);

    fn set_frequency(&mut self, frequency_hz: f32);

    /// Detune in cents (100 cents = 1 semitone).
    fn set_detune(&mut self, cents: f32);

    fn set_volume(&mut self, volume: f32);

    /// Stereo position, -1.0 (left) to 1.0 (right).
    fn set_pan(&mut self, pan: f32);

    /// Global pitch multiplier (pitch bend).
    fn set_pitch_ratio(&mut self, ratio: f32);

    /// Constant-power (left, right) gains for the current pan.
    fn pan_gains(&self) -> (f32, f32);

    fn frequency(&self) -> f32;

    /// Wavetable capability, if this slot has one.
    fn wavetable_mut(&mut self) -> Option<&mut dyn WavetableControl> {
        None
    }

    /// Jump smoothed controls to their targets.
    fn snap(&mut self);

    fn reset(&mut self) {}
}

/// Optional capability: morphing through a bank of single-cycle tables.
pub trait WavetableControl {
    fn table_count(&self) -> usize;

    /// Select a table by index. Out-of-range indices are ignored.
    fn select_wavetable(&mut self, index: usize);

    /// Morph position through the selected table, 0.0 - 1.0.
    fn set_wavetable_position(&mut self, position: f32);
}

/// Phase accumulator and the shared slot controls (volume, pan, tuning).
struct SlotCore {
    sample_rate: f32,
    phase: f32,
    base_frequency: f32,
    detune_ratio: f32,
    pitch_ratio: f32,
    volume: SmoothedParameter,
    pan_gains: (f32, f32),
}

impl SlotCore {
    fn new(sample_rate: f32, smoothing_ms: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        Self {
            sample_rate,
            phase: 0.0,
            base_frequency: 440.0,
            detune_ratio: 1.0,
            pitch_ratio: 1.0,
            volume: SmoothedParameter::new(0.5, smoothing_ms, sample_rate),
            pan_gains: pan_law(0.0),
        }
    }

    #[inline]
    fn advance_phase(&mut self) -> f32 {
        let phase = self.phase;
        let increment = self.frequency() / self.sample_rate;
        self.phase = (self.phase + increment).fract();
        phase
    }

    fn frequency(&self) -> f32 {
        self.base_frequency * self.detune_ratio * self.pitch_ratio
    }

    fn set_frequency(&mut self, frequency_hz: f32) {
        if frequency_hz.is_finite() {
            self.base_frequency = frequency_hz.clamp(0.0, self.sample_rate * 0.5);
        }
    }

    fn set_detune(&mut self, cents: f32) {
        if cents.is_finite() {
            self.detune_ratio = 2.0_f32.powf(cents / 1200.0);
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume.set_target(volume.clamp(0.0, 1.0));
        }
    }

    fn set_pan(&mut self, pan: f32) {
        if pan.is_finite() {
            self.pan_gains = pan_law(pan);
        }
    }

    fn set_pitch_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.pitch_ratio = ratio;
        }
    }
}

/// Constant-power pan law. Center gives equal gains of sqrt(1/2).
fn pan_law(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

#[inline]
fn shape(waveform: OscillatorWaveform, phase: f32, rng: &mut SmallRng) -> f32 {
    match waveform {
        OscillatorWaveform::Sine => (TAU * phase).sin(),
        OscillatorWaveform::Saw => 2.0 * phase - 1.0,
        OscillatorWaveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        OscillatorWaveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        OscillatorWaveform::Noise => rng.gen_range(-1.0..1.0),
    }
}

/// Classic phase-accumulator oscillator.
pub struct BasicOscillator {
    core: SlotCore,
    waveform: OscillatorWaveform,
    rng: SmallRng,
}

impl BasicOscillator {
    pub fn new(waveform: OscillatorWaveform, sample_rate: f32, smoothing_ms: f32) -> Self {
        Self {
            core: SlotCore::new(sample_rate, smoothing_ms),
            waveform,
            rng: SmallRng::seed_from_u64(0x5EED),
        }
    }

    pub fn waveform(&self) -> OscillatorWaveform {
        self.waveform
    }
}

impl Oscillator for BasicOscillator {
    fn process(&mut self) -> f32 {
        let volume = self.core.volume.advance();
        let phase = self.core.advance_phase();
        shape(self.waveform, phase, &mut self.rng) * volume
    }

    fn set_waveform(&mut self, waveform: OscillatorWaveform) {
        self.waveform = waveform;
    }

    fn set_frequency(&mut self, frequency_hz: f32) {
        self.core.set_frequency(frequency_hz);
    }

    fn set_detune(&mut self, cents: f32) {
        self.core.set_detune(cents);
    }

    fn set_volume(&mut self, volume: f32) {
        self.core.set_volume(volume);
    }

    fn set_pan(&mut self, pan: f32) {
        self.core.set_pan(pan);
    }

    fn set_pitch_ratio(&mut self, ratio: f32) {
        self.core.set_pitch_ratio(ratio);
    }

    fn pan_gains(&self) -> (f32, f32) {
        self.core.pan_gains
    }

    fn frequency(&self) -> f32 {
        self.core.frequency()
    }

    fn snap(&mut self) {
        let volume = self.core.volume.target();
        self.core.volume.set_current_and_target(volume);
    }

    fn reset(&mut self) {
        self.core.phase = 0.0;
    }
}

/// A bank of frames; the morph position interpolates between neighbours.
struct Wavetable {
    frames: Vec<Vec<f32>>,
}

impl Wavetable {
    /// Sine → triangle → saw → square.
    fn classic() -> Self {
        let mut rng = SmallRng::seed_from_u64(0);
        let shapes = [
            OscillatorWaveform::Sine,
            OscillatorWaveform::Triangle,
            OscillatorWaveform::Saw,
            OscillatorWaveform::Square,
        ];
        let frames = shapes
            .iter()
            .map(|&w| {
                (0..TABLE_LEN)
                    .map(|i| shape(w, i as f32 / TABLE_LEN as f32, &mut rng))
                    .collect()
            })
            .collect();
        Self { frames }
    }

    /// Additive frames with a growing number of 1/n harmonics.
    fn harmonic() -> Self {
        let frames = (0..FRAMES_PER_TABLE)
            .map(|frame| {
                let harmonics = 1 + frame * 4;
                let mut table: Vec<f32> = (0..TABLE_LEN)
                    .map(|i| {
                        let x = TAU * i as f32 / TABLE_LEN as f32;
                        (1..=harmonics).map(|h| (h as f32 * x).sin() / h as f32).sum::<f32>()
                    })
                    .collect();
                let peak = table.iter().fold(0.0f32, |acc, s| acc.max(s.abs())).max(1e-6);
                table.iter_mut().for_each(|s| *s /= peak);
                table
            })
            .collect();
        Self { frames }
    }

    #[inline]
    fn lookup(&self, phase: f32, position: f32) -> f32 {
        let last = self.frames.len() - 1;
        let frame_pos = position.clamp(0.0, 1.0) * last as f32;
        let frame_a = frame_pos.floor() as usize;
        let frame_b = (frame_a + 1).min(last);
        let blend = frame_pos - frame_a as f32;

        let index = phase * TABLE_LEN as f32;
        let i0 = (index as usize) % TABLE_LEN;
        let i1 = (i0 + 1) % TABLE_LEN;
        let frac = index - index.floor();

        let read = |frame: &[f32]| frame[i0] + (frame[i1] - frame[i0]) * frac;
        let a = read(&self.frames[frame_a]);
        let b = read(&self.frames[frame_b]);
        a + (b - a) * blend
    }
}

/// Oscillator that plays either a basic waveform or a morphing wavetable.
///
/// Choosing a waveform returns the slot to basic mode; selecting a table
/// switches it to wavetable mode.
pub struct WavetableOscillator {
    basic: BasicOscillator,
    tables: Vec<Wavetable>,
    selected: Option<usize>,
    position: SmoothedParameter,
}

impl WavetableOscillator {
    pub fn new(waveform: OscillatorWaveform, sample_rate: f32, smoothing_ms: f32) -> Self {
        Self {
            basic: BasicOscillator::new(waveform, sample_rate, smoothing_ms),
            tables: vec![Wavetable::classic(), Wavetable::harmonic()],
            selected: None,
            position: SmoothedParameter::new(0.0, smoothing_ms, sample_rate),
        }
    }

    pub fn selected_table(&self) -> Option<usize> {
        self.selected
    }

    pub fn wavetable_position(&self) -> f32 {
        self.position.target()
    }
}

impl Oscillator for WavetableOscillator {
    fn process(&mut self) -> f32 {
        match self.selected {
            None => self.basic.process(),
            Some(table) => {
                let volume = self.basic.core.volume.advance();
                let position = self.position.advance();
                let phase = self.basic.core.advance_phase();
                self.tables[table].lookup(phase, position) * volume
            }
        }
    }

    fn set_waveform(&mut self, waveform: OscillatorWaveform) {
        self.selected = None;
        self.basic.set_waveform(waveform);
    }

    fn set_frequency(&mut self, frequency_hz: f32) {
        self.basic.set_frequency(frequency_hz);
    }

    fn set_detune(&mut self, cents: f32) {
        self.basic.set_detune(cents);
    }

    fn set_volume(&mut self, volume: f32) {
        self.basic.set_volume(volume);
    }

    fn set_pan(&mut self, pan: f32) {
        self.basic.set_pan(pan);
    }

    fn set_pitch_ratio(&mut self, ratio: f32) {
        self.basic.set_pitch_ratio(ratio);
    }

    fn pan_gains(&self) -> (f32, f32) {
        self.basic.pan_gains()
    }

    fn frequency(&self) -> f32 {
        self.basic.frequency()
    }

    fn wavetable_mut(&mut self) -> Option<&mut dyn WavetableControl> {
        Some(self)
    }

    fn snap(&mut self) {
        self.basic.snap();
        let position = self.position.target();
        self.position.set_current_and_target(position);
    }

    fn reset(&mut self) {
        self.basic.reset();
    }
}

impl WavetableControl for WavetableOscillator {
    fn table_count(&self) -> usize {
        self.tables.len()
    }

    fn select_wavetable(&mut self, index: usize) {
        if index < self.tables.len() {
            self.selected = Some(index);
        }
    }

    fn set_wavetable_position(&mut self, position: f32) {
        if position.is_finite() {
            self.position.set_target(position.clamp(0.0, 1.0));
        }
    }
}
