//! MIDI decoding, learn, and the UI control channel.
//!
//! The engine's `process_midi_event` ties these together; nothing in here
//! touches the signal path directly.

pub mod learn;
pub mod message;
pub mod ui;

pub use learn::{CcMappingTable, MidiLearn};
pub use message::{
    midi_note_to_freq, normalize_7bit, normalize_pitch_bend, MidiEvent, PITCH_BEND_CENTER,
    PITCH_BEND_MAX, UI_CHANNEL,
};
pub use ui::{UiControlCallback, UiRouter};

/// Unmapped CC 7 drives master volume.
pub const FALLBACK_VOLUME_CC: u8 = 7;
/// Unmapped CC 1 (mod wheel) sweeps the filter cutoff.
pub const FALLBACK_CUTOFF_CC: u8 = 1;

pub const MOD_WHEEL_CUTOFF_MIN_HZ: f32 = 20.0;
pub const MOD_WHEEL_CUTOFF_MAX_HZ: f32 = 20_000.0;

/// Mod wheel position (0.0 - 1.0) to a cutoff in Hz, linear.
pub fn mod_wheel_to_cutoff(normalized: f32) -> f32 {
    MOD_WHEEL_CUTOFF_MIN_HZ + normalized * (MOD_WHEEL_CUTOFF_MAX_HZ - MOD_WHEEL_CUTOFF_MIN_HZ)
}
