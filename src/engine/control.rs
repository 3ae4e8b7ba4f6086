use std::sync::Arc;

use log::{debug, info, warn};

use super::SynthEngine;
use crate::automation::AutomationTracks;
use crate::error::PresetError;
use crate::midi::{
    mod_wheel_to_cutoff, normalize_7bit, normalize_pitch_bend, MidiEvent, UiControlCallback,
    FALLBACK_CUTOFF_CC, FALLBACK_VOLUME_CC, PITCH_BEND_MAX, UI_CHANNEL,
};
use crate::params::{
    is_xy_passthrough, XyAxis, CHANNEL_AFTERTOUCH, FILTER_CUTOFF, MASTER_VOLUME, PITCH_BEND,
};
use crate::preset::{Preset, XyPadTargets};

/// Notified with `(parameter_id, value)` for every replayed automation
/// event. Runs on the audio thread, so keep it short.
pub type AutomationCallback = Arc<dyn Fn(i32, f32) + Send + Sync>;

/// Channel the `send_*` helpers use (MIDI channel 1).
const HELPER_CHANNEL: u8 = 0;
const MOD_WHEEL_CC: u8 = 1;

impl SynthEngine {
    // MIDI

    /// Decode and handle one 3-byte MIDI message. Returns false for
    /// anything unhandled; never panics on malformed input.
    pub fn process_midi_event(&self, status: u8, data1: u8, data2: u8) -> bool {
        if !self.is_initialized() {
            return false;
        }
        let Some(event) = MidiEvent::parse(status, data1, data2) else {
            debug!("ignoring MIDI message {status:#04x} {data1:#04x} {data2:#04x}");
            return false;
        };

        if event.channel() == UI_CHANNEL {
            return match event {
                MidiEvent::ControlChange {
                    controller, value, ..
                } => self.ui.handle_cc(controller, value),
                other => {
                    debug!("non-CC message on the UI channel ignored: {other:?}");
                    false
                }
            };
        }

        match event {
            MidiEvent::NoteOn { key, velocity, .. } => self.note_on(key, velocity),
            MidiEvent::NoteOff { key, .. } => self.note_off(key),
            MidiEvent::PitchBend { value, .. } => {
                self.set_parameter(PITCH_BEND, normalize_pitch_bend(value), false)
            }
            MidiEvent::ChannelPressure { pressure, .. } => {
                self.set_parameter(CHANNEL_AFTERTOUCH, normalize_7bit(pressure), false)
            }
            MidiEvent::PolyAftertouch { key, pressure, .. } => {
                let held = self.notes.lock().contains_key(&key);
                if held {
                    self.set_parameter(CHANNEL_AFTERTOUCH, normalize_7bit(pressure), false)
                } else {
                    debug!("poly aftertouch for note {key}, which is not held");
                    false
                }
            }
            MidiEvent::ControlChange {
                controller, value, ..
            } => self.handle_control_change(controller, value),
            MidiEvent::ProgramChange { program, .. } => {
                debug!("program change {program} ignored");
                false
            }
        }
    }

    fn handle_control_change(&self, controller: u8, value: u8) -> bool {
        if let Some(parameter_id) = self.learn.take() {
            let displaced = {
                let mut table = self.cc_mappings.lock();
                let displaced = table.assign(controller, parameter_id);
                table.remember_value(controller, value);
                displaced
            };
            match displaced {
                Some(old) => info!(
                    "MIDI learn: CC {controller} -> parameter {parameter_id} (was CC {old})"
                ),
                None => info!("MIDI learn: CC {controller} -> parameter {parameter_id}"),
            }
            return true;
        }

        let mapped = {
            let mut table = self.cc_mappings.lock();
            let mapped = table.get(controller);
            if mapped.is_some() {
                table.remember_value(controller, value);
            }
            mapped
        };
        if let Some(parameter_id) = mapped {
            return self.set_parameter(parameter_id, normalize_7bit(value), false);
        }

        match controller {
            FALLBACK_VOLUME_CC => self.set_parameter(MASTER_VOLUME, normalize_7bit(value), false),
            FALLBACK_CUTOFF_CC => {
                let cutoff = mod_wheel_to_cutoff(normalize_7bit(value));
                self.set_parameter(FILTER_CUTOFF, cutoff, false)
            }
            _ => {
                debug!("CC {controller} is not mapped");
                false
            }
        }
    }

    /// Feed a pitch bend (0 - 16383, 8192 centered) through the MIDI path.
    pub fn send_pitch_bend(&self, value: u16) -> bool {
        self.send_midi(MidiEvent::PitchBend {
            channel: HELPER_CHANNEL,
            value: value.min(PITCH_BEND_MAX),
        })
    }

    pub fn send_mod_wheel(&self, value: u8) -> bool {
        self.send_midi(MidiEvent::ControlChange {
            channel: HELPER_CHANNEL,
            controller: MOD_WHEEL_CC,
            value: value.min(127),
        })
    }

    pub fn send_poly_aftertouch(&self, note: u8, pressure: u8) -> bool {
        self.send_midi(MidiEvent::PolyAftertouch {
            channel: HELPER_CHANNEL,
            key: note.min(127),
            pressure: pressure.min(127),
        })
    }

    fn send_midi(&self, event: MidiEvent) -> bool {
        let [status, data1, data2] = event.to_bytes();
        self.process_midi_event(status, data1, data2)
    }

    // MIDI learn

    /// Bind the next incoming CC to `parameter_id`.
    pub fn start_midi_learn(&self, parameter_id: i32) {
        self.learn.arm(parameter_id);
        info!("MIDI learn armed for parameter {parameter_id}");
    }

    pub fn stop_midi_learn(&self) {
        if self.learn.is_active() {
            self.learn.disarm();
            info!("MIDI learn cancelled");
        }
    }

    pub fn is_midi_learn_active(&self) -> bool {
        self.learn.is_active()
    }

    pub fn cc_mapping(&self, cc: u8) -> Option<i32> {
        self.cc_mappings.lock().get(cc)
    }

    /// `(cc, parameter_id)` pairs sorted by CC.
    pub fn cc_mappings(&self) -> Vec<(u8, i32)> {
        self.cc_mappings.lock().snapshot()
    }

    /// Last value seen on a mapped CC.
    pub fn last_cc_value(&self, cc: u8) -> Option<u8> {
        self.cc_mappings.lock().last_value(cc)
    }

    // UI channel

    pub fn set_ui_control_callback(&self, callback: Option<UiControlCallback>) {
        self.ui.set_callback(callback);
    }

    pub fn ui_target_panel(&self) -> u8 {
        self.ui.target_panel()
    }

    // Automation

    pub fn start_automation_recording(&self) {
        self.automation.start_recording();
    }

    pub fn stop_automation_recording(&self) {
        self.automation.stop_recording();
    }

    /// Replay from the start. False when nothing has been recorded.
    pub fn start_automation_playback(&self) -> bool {
        self.automation.start_playback()
    }

    pub fn stop_automation_playback(&self) {
        self.automation.stop_playback();
    }

    pub fn clear_automation(&self) {
        self.automation.clear();
    }

    pub fn has_automation_data(&self) -> bool {
        self.automation.has_data()
    }

    pub fn is_automation_recording(&self) -> bool {
        self.automation.is_recording()
    }

    pub fn is_automation_playing(&self) -> bool {
        self.automation.is_playing()
    }

    pub fn automation_tracks(&self) -> AutomationTracks {
        self.automation.tracks()
    }

    pub fn set_automation_callback(&self, callback: Option<AutomationCallback>) {
        *self.automation_callback.lock() = callback;
    }

    // Presets

    /// Serialize the parameter cache, CC mappings, XY pad targets and any
    /// automation.
    pub fn export_preset(&self, name: &str) -> Result<String, PresetError> {
        let parameters = self
            .parameters
            .lock()
            .iter()
            .map(|(&id, &value)| (id, value))
            .collect();
        let midi_cc_mappings = self.cc_mappings().into_iter().collect();
        let tracks = self.automation.tracks();

        let preset = Preset {
            name: name.to_owned(),
            parameters,
            midi_cc_mappings: Some(midi_cc_mappings),
            automation_tracks: (!tracks.is_empty()).then_some(tracks),
            xy_pad: Some(XyPadTargets {
                x: self.xy_pad_parameter(XyAxis::X),
                y: self.xy_pad_parameter(XyAxis::Y),
            }),
        };
        preset.to_json()
    }

    /// Apply a preset document. Entries that fail to apply are logged and
    /// skipped; only an unreadable document is an error.
    pub fn import_preset(&self, json: &str) -> Result<(), PresetError> {
        if !self.is_initialized() {
            return Err(PresetError::NotInitialized);
        }
        let preset = Preset::from_json(json)?;

        if let Some(pad) = preset.xy_pad {
            self.set_xy_pad_parameter(XyAxis::X, pad.x);
            self.set_xy_pad_parameter(XyAxis::Y, pad.y);
        }

        let mut applied = 0;
        for (&id, &value) in &preset.parameters {
            // Pad positions are cache-only; their targets carry their own entries
            if is_xy_passthrough(id) {
                self.parameters.lock().insert(id, value);
                applied += 1;
                continue;
            }
            if self.set_parameter(id, value, false) {
                applied += 1;
            } else {
                warn!("preset {:?}: parameter {id} = {value} not applied", preset.name);
            }
        }

        if let Some(mappings) = &preset.midi_cc_mappings {
            let mut table = self.cc_mappings.lock();
            table.clear();
            for (&cc, &parameter_id) in mappings {
                table.assign(cc, parameter_id);
            }
        }

        if let Some(tracks) = preset.automation_tracks {
            self.automation.replace_tracks(tracks);
        }

        info!(
            "preset {:?} loaded: {applied} of {} parameters applied",
            preset.name,
            preset.parameters.len()
        );
        Ok(())
    }
}
