//! The engine orchestrator.
//!
//! `SynthEngine` is shared (`Arc`) between the host's control threads and
//! the audio callback. Control calls update small lock-protected tables and
//! push `EngineCommand`s; the audio callback owns the `SignalPath` and never
//! blocks on anything the control side holds for long.

mod control;
mod router;
mod signal_path;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::analysis::{is_valid_fft_size, AnalysisReadings, AnalysisSnapshot, SpectrumAnalyzer};
use crate::automation::Automation;
use crate::backend::{default_backend, AudioBackend, RenderCallback, StreamSettings};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::midi::{midi_note_to_freq, normalize_7bit, CcMappingTable, MidiLearn, UiRouter};
use crate::params::{FILTER_CUTOFF, FILTER_RESONANCE};

pub use control::AutomationCallback;
pub use signal_path::PITCH_BEND_SEMITONES;

use self::signal_path::{EngineCommand, Garbage, SignalPath};

/// Smallest command ring. The garbage ring matches it.
const MIN_COMMAND_CAPACITY: usize = 16;

const DEFAULT_CUTOFF_HZ: f32 = 1000.0;
const DEFAULT_RESONANCE: f32 = 0.5;

/// Helper to store f32 in AtomicU32
#[inline]
fn f32_to_u32(f: f32) -> u32 {
    f.to_bits()
}

/// Helper to load f32 from AtomicU32
#[inline]
fn u32_to_f32(u: u32) -> f32 {
    f32::from_bits(u)
}

pub struct SynthEngine {
    config: Mutex<EngineConfig>,
    backend: Mutex<Box<dyn AudioBackend>>,

    initialized: AtomicBool,
    muted: AtomicBool,
    oscillator_count: AtomicUsize,
    fft_size: AtomicUsize,
    /// Retired items the audio thread had to free itself, not yet reported.
    garbage_overflow: AtomicUsize,
    xy_pad_x: AtomicI32,
    xy_pad_y: AtomicI32,

    // Control-side copies of module targets, for read-back without
    // touching the audio thread
    master_volume: AtomicU32,
    filter_cutoff: AtomicU32,
    filter_resonance: AtomicU32,

    signal_path: Mutex<Option<SignalPath>>,
    commands: Mutex<Option<Producer<EngineCommand>>>,
    garbage: Mutex<Option<Consumer<Garbage>>>,

    notes: Mutex<HashMap<u8, f32>>,
    parameters: Mutex<HashMap<i32, f32>>,
    cc_mappings: Mutex<CcMappingTable>,

    learn: MidiLearn,
    ui: UiRouter,
    automation: Automation,
    automation_callback: Mutex<Option<AutomationCallback>>,
    readings: Arc<AnalysisReadings>,
}

impl SynthEngine {
    /// Engine on the platform backend (`cpal` when enabled).
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Self::with_backend(config, default_backend())
    }

    pub fn with_backend(mut config: EngineConfig, backend: Box<dyn AudioBackend>) -> Arc<Self> {
        if !is_valid_fft_size(config.fft_size) {
            let fallback = EngineConfig::default().fft_size;
            warn!(
                "configured FFT size {} is invalid, using {fallback}",
                config.fft_size
            );
            config.fft_size = fallback;
        }

        Arc::new(Self {
            fft_size: AtomicUsize::new(config.fft_size),
            garbage_overflow: AtomicUsize::new(0),
            master_volume: AtomicU32::new(f32_to_u32(config.initial_volume)),
            config: Mutex::new(config),
            backend: Mutex::new(backend),
            initialized: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            oscillator_count: AtomicUsize::new(0),
            xy_pad_x: AtomicI32::new(FILTER_CUTOFF),
            xy_pad_y: AtomicI32::new(FILTER_RESONANCE),
            filter_cutoff: AtomicU32::new(f32_to_u32(DEFAULT_CUTOFF_HZ)),
            filter_resonance: AtomicU32::new(f32_to_u32(DEFAULT_RESONANCE)),
            signal_path: Mutex::new(None),
            commands: Mutex::new(None),
            garbage: Mutex::new(None),
            notes: Mutex::new(HashMap::new()),
            parameters: Mutex::new(HashMap::new()),
            cc_mappings: Mutex::new(CcMappingTable::new()),
            learn: MidiLearn::default(),
            ui: UiRouter::new(),
            automation: Automation::new(),
            automation_callback: Mutex::new(None),
            readings: Arc::new(AnalysisReadings::new()),
        })
    }

    /// Build the default modules and start the backend. A no-op once
    /// initialized.
    pub fn initialize(
        self: &Arc<Self>,
        sample_rate: u32,
        buffer_size: u32,
        initial_volume: f32,
    ) -> Result<(), EngineError> {
        // The backend lock doubles as the lifecycle lock
        let mut backend = self.backend.lock();
        if self.is_initialized() {
            debug!("initialize called on a running engine, ignoring");
            return Ok(());
        }
        if sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        if buffer_size == 0 {
            return Err(EngineError::InvalidBufferSize(buffer_size));
        }

        let initial_volume = if initial_volume.is_finite() {
            initial_volume.clamp(0.0, 1.0)
        } else {
            warn!("initial volume {initial_volume} is not finite, using 0");
            0.0
        };

        let config = {
            let mut config = self.config.lock();
            config.sample_rate = sample_rate;
            config.buffer_size = buffer_size;
            config.initial_volume = initial_volume;
            config.fft_size = self.fft_size.load(Ordering::Acquire);
            config.clone()
        };

        // Garbage is collected after every push, so at most one ring of
        // commands can retire items before the next collection
        let capacity = config.command_capacity.max(MIN_COMMAND_CAPACITY);
        let (command_tx, command_rx) = RingBuffer::new(capacity);
        let (garbage_tx, garbage_rx) = RingBuffer::new(capacity);
        let path = SignalPath::new(&config, command_rx, garbage_tx, self.readings.clone())?;

        self.master_volume
            .store(f32_to_u32(initial_volume), Ordering::Release);
        self.filter_cutoff
            .store(f32_to_u32(DEFAULT_CUTOFF_HZ), Ordering::Release);
        self.filter_resonance
            .store(f32_to_u32(DEFAULT_RESONANCE), Ordering::Release);
        self.oscillator_count
            .store(path.oscillator_count(), Ordering::Release);
        self.muted.store(false, Ordering::Release);

        *self.signal_path.lock() = Some(path);
        *self.commands.lock() = Some(command_tx);
        *self.garbage.lock() = Some(garbage_rx);
        self.initialized.store(true, Ordering::Release);

        let engine: Weak<Self> = Arc::downgrade(self);
        let render: RenderCallback = Box::new(move |output: &mut [f32]| match engine.upgrade() {
            Some(engine) => engine.process_audio(output),
            None => output.fill(0.0),
        });
        let settings = StreamSettings {
            sample_rate,
            buffer_size,
            channels: config.output_channels.max(1),
        };

        if let Err(err) = backend.start(settings, render) {
            error!("{} backend failed to start: {err}", backend.name());
            self.initialized.store(false, Ordering::Release);
            backend.stop();
            drop(backend);
            self.release_state();
            return Err(err.into());
        }

        info!(
            "engine initialized on {}: {sample_rate} Hz, {buffer_size} frames, {} channels, FFT {}",
            backend.name(),
            settings.channels,
            config.fft_size
        );
        Ok(())
    }

    /// Stop the backend and drop every module and table. Safe to call more
    /// than once.
    pub fn shutdown(&self) {
        let mut backend = self.backend.lock();
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        backend.stop();
        drop(backend);
        self.release_state();
        info!("engine shut down");
    }

    fn release_state(&self) {
        self.signal_path.lock().take();
        self.commands.lock().take();
        self.garbage.lock().take();

        self.notes.lock().clear();
        self.parameters.lock().clear();
        self.cc_mappings.lock().clear();

        self.learn.disarm();
        self.automation.clear();
        self.ui.reset();
        self.readings.clear();
        self.muted.store(false, Ordering::Release);
        self.oscillator_count.store(0, Ordering::Release);
        self.garbage_overflow.store(0, Ordering::Relaxed);
    }

    /// The audio callback. Fills `output` (interleaved, `output_channels`
    /// wide) and never blocks: if the signal path is busy the block is
    /// silent.
    pub fn process_audio(&self, output: &mut [f32]) {
        if !self.is_initialized() {
            output.fill(0.0);
            return;
        }
        let Some(mut guard) = self.signal_path.try_lock() else {
            output.fill(0.0);
            return;
        };
        let Some(path) = guard.as_mut() else {
            output.fill(0.0);
            return;
        };

        let freed_in_place = path.drain_commands();
        if freed_in_place > 0 {
            self.garbage_overflow
                .fetch_add(freed_in_place, Ordering::Relaxed);
        }

        // Muted blocks skip rendering but still drain commands and replay
        // automation, so a recorded unmute lands (see DESIGN.md, muted blocks)
        if self.is_muted() {
            output.fill(0.0);
        } else {
            path.render(output);
        }

        self.run_automation(path);
    }

    /// Push a command to the audio thread, then free whatever it retired.
    fn send(&self, command: EngineCommand) -> bool {
        let sent = match self.commands.lock().as_mut() {
            Some(producer) => match producer.push(command) {
                Ok(()) => true,
                Err(_) => {
                    warn!("engine command queue full, dropping update");
                    false
                }
            },
            None => false,
        };
        self.collect_garbage();
        sent
    }

    fn collect_garbage(&self) {
        if let Some(consumer) = self.garbage.lock().as_mut() {
            while let Ok(retired) = consumer.pop() {
                drop(retired);
            }
        }
        let overflowed = self.garbage_overflow.swap(0, Ordering::Relaxed);
        if overflowed > 0 {
            warn!("garbage ring full: {overflowed} retired buffers were freed on the audio thread");
        }
    }

    // Notes

    /// Gate a note. Velocity 0 is a note off.
    pub fn note_on(&self, note: u8, velocity: u8) -> bool {
        if !self.is_initialized() {
            return false;
        }
        if note > 127 || velocity > 127 {
            warn!("note on out of range: note {note}, velocity {velocity}");
            return false;
        }
        if velocity == 0 {
            return self.note_off(note);
        }

        let velocity = normalize_7bit(velocity);
        self.notes.lock().insert(note, velocity);
        self.send(EngineCommand::NoteOn {
            frequency: midi_note_to_freq(note),
            velocity,
        })
    }

    /// Release a note. The envelope only releases once no note is held.
    pub fn note_off(&self, note: u8) -> bool {
        if !self.is_initialized() || note > 127 {
            return false;
        }
        let release = {
            let mut notes = self.notes.lock();
            notes.remove(&note).is_some() && notes.is_empty()
        };
        if release {
            self.send(EngineCommand::NoteRelease);
        }
        true
    }

    /// Held notes, ascending.
    pub fn active_notes(&self) -> Vec<u8> {
        let mut notes: Vec<u8> = self.notes.lock().keys().copied().collect();
        notes.sort_unstable();
        notes
    }

    // Granular and analysis

    /// Hand a new source buffer to the granular synth. The previous buffer
    /// is freed on this side.
    pub fn load_granular_buffer(&self, samples: Vec<f32>) -> bool {
        if !self.is_initialized() {
            return false;
        }
        if samples.is_empty() {
            warn!("refusing to load an empty granular buffer");
            return false;
        }
        let len = samples.len();
        let sent = self.send(EngineCommand::LoadGranular(samples));
        if sent {
            info!("granular buffer loaded: {len} samples");
        }
        sent
    }

    /// Resize the analyzer. Invalid sizes keep the current one.
    pub fn set_fft_size(&self, fft_size: usize) -> bool {
        if !is_valid_fft_size(fft_size) {
            warn!(
                "invalid FFT size {fft_size}, keeping {}",
                self.fft_size.load(Ordering::Acquire)
            );
            return false;
        }

        if !self.is_initialized() {
            self.fft_size.store(fft_size, Ordering::Release);
            self.config.lock().fft_size = fft_size;
            return true;
        }

        let sample_rate = self.config.lock().sample_rate as f32;
        let analyzer = match SpectrumAnalyzer::new(fft_size, sample_rate, self.readings.clone()) {
            Ok(analyzer) => analyzer,
            Err(err) => {
                error!("{err}");
                return false;
            }
        };
        if !self.send(EngineCommand::ReplaceAnalyzer(Box::new(analyzer))) {
            return false;
        }
        self.fft_size.store(fft_size, Ordering::Release);
        self.config.lock().fft_size = fft_size;
        debug!("analyzer resized to {fft_size}");
        true
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size.load(Ordering::Acquire)
    }

    pub fn bass_level(&self) -> f64 {
        self.readings.bass()
    }

    pub fn mid_level(&self) -> f64 {
        self.readings.mid()
    }

    pub fn high_level(&self) -> f64 {
        self.readings.high()
    }

    pub fn amplitude_level(&self) -> f64 {
        self.readings.amplitude()
    }

    pub fn dominant_frequency(&self) -> f64 {
        self.readings.dominant_frequency()
    }

    pub fn analysis(&self) -> AnalysisSnapshot {
        self.readings.snapshot()
    }

    // Status

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.lock().sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.config.lock().buffer_size
    }

    pub fn output_channels(&self) -> u16 {
        self.config.lock().output_channels.max(1)
    }

    pub fn oscillator_count(&self) -> usize {
        self.oscillator_count.load(Ordering::Acquire)
    }

    pub fn config(&self) -> EngineConfig {
        self.config.lock().clone()
    }
}
