//! Synthesis modules driven by the engine's signal path.
//!
//! Everything here is allocation-free once constructed, making it safe to
//! run inside the audio callback. Setters only store targets or plain
//! values; any gliding happens inside `process`.

/// Time-domain delay line and the stereo feedback delay effect.
pub mod delay;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// State-variable filter implementation with multiple responses.
pub mod filter;
/// Grain cloud over a loaded sample buffer.
pub mod granular;
/// Oscillator slots, basic and wavetable.
pub mod oscillator;
/// Schroeder reverb.
pub mod reverb;
/// One-pole parameter smoothing.
pub mod smoothing;

pub use delay::Delay;
pub use envelope::{Envelope, EnvelopeState};
pub use filter::{Filter, FilterType};
pub use granular::{GrainWindow, GranularSynth};
pub use oscillator::{BasicOscillator, Oscillator, OscillatorWaveform, WavetableControl, WavetableOscillator};
pub use reverb::Reverb;
pub use smoothing::SmoothedParameter;
