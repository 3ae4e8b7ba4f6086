use std::sync::Arc;

use rtrb::{Consumer, Producer};

use crate::analysis::{AnalysisReadings, SpectrumAnalyzer};
use crate::config::EngineConfig;
use crate::dsp::{
    Delay, Envelope, Filter, FilterType, GrainWindow, GranularSynth, Oscillator,
    OscillatorWaveform, Reverb, SmoothedParameter, WavetableOscillator,
};
use crate::error::EngineError;
use crate::params::{EffectField, EnvelopeField, FilterField, GranularField, OscillatorField, Route};

/*
Signal Path
===========

Everything the audio thread owns. The control side never touches it
directly; it sends `EngineCommand`s through a wait-free ring and the
audio thread applies them at the top of each block.

Per sample:

    master.advance()
    Σ osc.process() [× envelope while active]  → pan → stereo
          │
          ▼
       filter  ──→  + granular  ──→  delay  ──→  reverb  ──→  × master
                                                                  │
                                                  mono: (L+R)/2 ◄─┴─► stereo: L, R

After the block: spectrum analysis over the finished output.

Anything that owns heap memory and gets replaced (granular buffers, the
analyzer) travels back through the `garbage` ring so the audio thread
never frees.
*/

/// Pitch bend range in semitones, each direction.
pub const PITCH_BEND_SEMITONES: f32 = 2.0;

pub(crate) enum EngineCommand {
    Parameter { route: Route, value: f32 },
    NoteOn { frequency: f32, velocity: f32 },
    NoteRelease,
    LoadGranular(Vec<f32>),
    ReplaceAnalyzer(Box<SpectrumAnalyzer>),
}

/// Heap memory retired by the audio thread, dropped on the control side.
pub(crate) enum Garbage {
    GranularBuffer(Vec<f32>),
    Analyzer(Box<SpectrumAnalyzer>),
}

pub(crate) struct SignalPath {
    channels: usize,
    master_volume: SmoothedParameter,
    oscillators: Vec<Box<dyn Oscillator>>,
    filter: Filter,
    envelope: Envelope,
    delay: Delay,
    reverb: Reverb,
    granular: GranularSynth,
    analyzer: Box<SpectrumAnalyzer>,
    commands: Consumer<EngineCommand>,
    garbage: Producer<Garbage>,
    /// Scratch for due automation events, capacity fixed at build.
    pub(crate) automation_due: Vec<(i32, f32)>,
    /// Cache writes that lost a `try_lock` race, retried next block.
    pub(crate) pending_cache: Vec<(i32, f32)>,
}

impl SignalPath {
    /// Build the default module set.
    pub fn new(
        config: &EngineConfig,
        commands: Consumer<EngineCommand>,
        garbage: Producer<Garbage>,
        readings: Arc<AnalysisReadings>,
    ) -> Result<Self, EngineError> {
        let sample_rate = config.sample_rate as f32;
        let smoothing_ms = config.smoothing_ms;

        let mut master_volume = SmoothedParameter::new(0.0, smoothing_ms, sample_rate);
        master_volume.set_current_and_target(config.initial_volume.clamp(0.0, 1.0));

        let mut osc0 = WavetableOscillator::new(OscillatorWaveform::Sine, sample_rate, smoothing_ms);
        osc0.set_volume(0.5);
        let mut osc1 =
            WavetableOscillator::new(OscillatorWaveform::Square, sample_rate, smoothing_ms);
        osc1.set_volume(0.3);
        osc1.set_detune(5.0);
        let mut oscillators: Vec<Box<dyn Oscillator>> = vec![Box::new(osc0), Box::new(osc1)];
        // Defaults apply without a ramp
        for osc in &mut oscillators {
            osc.snap();
        }

        let mut filter = Filter::new(FilterType::LowPass, sample_rate, smoothing_ms);
        filter.set_cutoff(1000.0);
        filter.set_resonance(0.5);
        filter.snap();

        let envelope = Envelope::adsr(sample_rate, 0.01, 0.1, 0.7, 0.5);

        let mut delay = Delay::new(sample_rate, smoothing_ms);
        delay.snap_time(0.5);
        delay.set_feedback(0.3);
        delay.set_mix(0.2);

        let mut reverb = Reverb::new(sample_rate);
        reverb.set_room_size(0.5);
        reverb.set_damping(0.5);
        reverb.set_mix(0.2);

        let analyzer = Box::new(SpectrumAnalyzer::new(config.fft_size, sample_rate, readings)?);

        Ok(Self {
            channels: config.output_channels.max(1) as usize,
            master_volume,
            oscillators,
            filter,
            envelope,
            delay,
            reverb,
            granular: GranularSynth::new(sample_rate),
            analyzer,
            commands,
            garbage,
            automation_due: Vec::with_capacity(config.automation_drain_limit.max(1)),
            pending_cache: Vec::with_capacity(config.automation_drain_limit.max(1)),
        })
    }

    pub fn oscillator_count(&self) -> usize {
        self.oscillators.len()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Apply every queued control command. Returns how many retired items
    /// found the garbage ring full and were freed here instead.
    pub fn drain_commands(&mut self) -> usize {
        let mut freed_in_place = 0;
        while let Ok(command) = self.commands.pop() {
            match command {
                EngineCommand::Parameter { route, value } => self.apply(route, value),
                EngineCommand::NoteOn {
                    frequency,
                    velocity,
                } => {
                    for osc in &mut self.oscillators {
                        osc.set_frequency(frequency);
                    }
                    self.envelope.note_on(velocity);
                }
                EngineCommand::NoteRelease => self.envelope.note_off(),
                EngineCommand::LoadGranular(buffer) => {
                    let old = self.granular.set_buffer(buffer);
                    if !self.retire(Garbage::GranularBuffer(old)) {
                        freed_in_place += 1;
                    }
                }
                EngineCommand::ReplaceAnalyzer(analyzer) => {
                    let old = std::mem::replace(&mut self.analyzer, analyzer);
                    if !self.retire(Garbage::Analyzer(old)) {
                        freed_in_place += 1;
                    }
                }
            }
        }
        freed_in_place
    }

    /// Hand `garbage` back to the control side. False when the ring is full
    /// and the item was dropped here.
    fn retire(&mut self, garbage: Garbage) -> bool {
        self.garbage.push(garbage).is_ok()
    }

    /// Route a decoded parameter to its module. Slot bounds were checked by
    /// the caller; an out-of-range slot is ignored here.
    pub fn apply(&mut self, route: Route, value: f32) {
        match route {
            Route::MasterVolume => {
                if value.is_finite() {
                    self.master_volume.set_target(value.clamp(0.0, 1.0));
                }
            }
            Route::PitchBend => {
                let ratio = 2.0_f32.powf(value.clamp(-1.0, 1.0) * PITCH_BEND_SEMITONES / 12.0);
                for osc in &mut self.oscillators {
                    osc.set_pitch_ratio(ratio);
                }
            }
            Route::Filter(field) => match field {
                FilterField::Cutoff => self.filter.set_cutoff(value),
                FilterField::Resonance => self.filter.set_resonance(value),
                FilterField::Type => self.filter.set_type(FilterType::from_index(value as i32)),
            },
            Route::Envelope(field) => match field {
                EnvelopeField::Attack => self.envelope.set_attack(value),
                EnvelopeField::Decay => self.envelope.set_decay(value),
                EnvelopeField::Sustain => self.envelope.set_sustain(value),
                EnvelopeField::Release => self.envelope.set_release(value),
            },
            Route::Effect(field) => match field {
                EffectField::ReverbMix => self.reverb.set_mix(value),
                EffectField::DelayTime => self.delay.set_time(value),
                EffectField::DelayFeedback => self.delay.set_feedback(value),
            },
            Route::Granular(field) => self.apply_granular(field, value),
            Route::Oscillator { slot, field } => {
                if let Some(osc) = self.oscillators.get_mut(slot) {
                    apply_oscillator(osc.as_mut(), field, value);
                }
            }
            // Handled on the control side or cache-only
            Route::MasterMute | Route::ChannelAftertouch | Route::XyPad(_) | Route::GenericCc(_) => {}
        }
    }

    fn apply_granular(&mut self, field: GranularField, value: f32) {
        let granular = &mut self.granular;
        match field {
            GranularField::Active => granular.set_active(value >= 0.5),
            GranularField::GrainRate => granular.set_rate(value),
            GranularField::GrainDuration => granular.set_duration(value),
            GranularField::Position => granular.set_position(value),
            GranularField::Pitch => granular.set_pitch(value),
            GranularField::Amplitude => granular.set_amplitude(value),
            GranularField::PositionVariation => granular.set_position_variation(value),
            GranularField::PitchVariation => granular.set_pitch_variation(value),
            GranularField::DurationVariation => granular.set_duration_variation(value),
            GranularField::Pan => granular.set_pan(value),
            GranularField::PanVariation => granular.set_pan_variation(value),
            GranularField::WindowType => granular.set_window(GrainWindow::from_index(value as i32)),
        }
    }

    /// Render one interleaved block and analyze it.
    pub fn render(&mut self, output: &mut [f32]) {
        let channels = self.channels;

        for frame in output.chunks_mut(channels) {
            let gain = self.master_volume.advance();
            let envelope = if self.envelope.is_active() {
                Some(self.envelope.process())
            } else {
                None
            };

            let mut left = 0.0;
            let mut right = 0.0;
            for osc in &mut self.oscillators {
                let mut sample = osc.process();
                if let Some(level) = envelope {
                    sample *= level;
                }
                let (gain_l, gain_r) = osc.pan_gains();
                left += sample * gain_l;
                right += sample * gain_r;
            }

            let (mut left, mut right) = self.filter.process(left, right);

            let (grain_l, grain_r) = self.granular.process();
            left += grain_l;
            right += grain_r;

            let (left, right) = self.delay.process(left, right);
            let (left, right) = self.reverb.process(left, right);
            let (left, right) = (left * gain, right * gain);

            match frame {
                [mono] => *mono = (left + right) * 0.5,
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }

        self.analyzer.analyze(output, channels);
    }
}

fn apply_oscillator(osc: &mut dyn Oscillator, field: OscillatorField, value: f32) {
    match field {
        OscillatorField::Type => osc.set_waveform(OscillatorWaveform::from_index(value as i32)),
        OscillatorField::Frequency => osc.set_frequency(value),
        OscillatorField::Detune => osc.set_detune(value),
        OscillatorField::Volume => osc.set_volume(value),
        OscillatorField::Pan => osc.set_pan(value),
        OscillatorField::WavetableIndex => {
            if let Some(table) = osc.wavetable_mut() {
                if value >= 0.0 {
                    table.select_wavetable(value as usize);
                }
            }
        }
        OscillatorField::WavetablePosition => {
            if let Some(table) = osc.wavetable_mut() {
                table.set_wavetable_position(value);
            }
        }
    }
}
