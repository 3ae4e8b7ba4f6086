//! Realtime synthesis engine: a small fixed signal path driven by numeric
//! parameter ids, MIDI (with learn), recorded automation and presets, with
//! spectral readings published for visualizers.
//!
//! ```no_run
//! use synther_engine::{params, EngineConfig, SynthEngine};
//!
//! let engine = SynthEngine::new(EngineConfig::default());
//! engine.initialize(48_000, 256, 0.8)?;
//! engine.note_on(60, 100);
//! engine.set_parameter(params::FILTER_CUTOFF, 2_400.0, false);
//! println!("dominant: {:.1} Hz", engine.dominant_frequency());
//! engine.shutdown();
//! # Ok::<(), synther_engine::EngineError>(())
//! ```

pub mod analysis;
pub mod automation;
pub mod backend;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod midi;
pub mod params;
pub mod preset;

pub use analysis::AnalysisSnapshot;
pub use automation::{AutomationEvent, AutomationTracks};
pub use backend::{AudioBackend, OfflineBackend, OfflineHandle, StreamSettings};
pub use config::EngineConfig;
pub use engine::{AutomationCallback, SynthEngine};
pub use error::{BackendError, EngineError, PresetError};
pub use midi::UiControlCallback;
pub use params::XyAxis;
pub use preset::{Preset, XyPadTargets};

/// Shortest envelope stage, one sample at 48 kHz.
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
