use std::sync::atomic::Ordering;

use log::{debug, warn};

use super::signal_path::{EngineCommand, SignalPath};
use super::{f32_to_u32, u32_to_f32, SynthEngine};
use crate::params::{
    is_xy_passthrough, FilterField, Route, XyAxis, FILTER_CUTOFF, FILTER_RESONANCE, MASTER_MUTE,
    MASTER_VOLUME, XY_PAD_X, XY_PAD_Y,
};

/// What the control side does with a decoded route.
enum Dispatch {
    /// Forward to the signal path.
    Forward,
    /// Fully handled on the control side.
    Handled,
    /// Target module does not exist.
    Missing,
}

impl SynthEngine {
    /// Set parameter `id`. The cache is written before dispatch, so it holds
    /// `value` even when dispatch fails. Returns false for unknown ids,
    /// missing oscillator slots, or when not initialized.
    ///
    /// `from_automation` marks replayed events so they are not recorded
    /// again.
    pub fn set_parameter(&self, id: i32, value: f32, from_automation: bool) -> bool {
        if !self.is_initialized() {
            debug!("set_parameter({id}) before initialize");
            return false;
        }

        if !from_automation && self.automation.is_recording() {
            self.automation.record(id, value);
        }

        self.parameters.lock().insert(id, value);

        let id = match self.xy_target(id) {
            Some(target) if is_xy_passthrough(target) => {
                warn!("XY pad {id} points at another pad ({target}), ignoring");
                return false;
            }
            Some(target) => {
                self.parameters.lock().insert(target, value);
                target
            }
            None => id,
        };

        let Some(route) = Route::decode(id) else {
            warn!("unknown parameter id {id}");
            return false;
        };

        match self.dispatch(route, value, self.oscillator_count()) {
            Dispatch::Forward => self.send(EngineCommand::Parameter { route, value }),
            Dispatch::Handled => true,
            Dispatch::Missing => {
                warn!("parameter {id} targets a module that does not exist ({route:?})");
                false
            }
        }
    }

    /// Last value set for `id`. Falls back to the live target for master
    /// volume, mute and the filter; anything never set reads 0.
    pub fn get_parameter(&self, id: i32) -> f32 {
        if !self.is_initialized() {
            return 0.0;
        }
        if let Some(&value) = self.parameters.lock().get(&id) {
            return value;
        }
        match id {
            MASTER_VOLUME => u32_to_f32(self.master_volume.load(Ordering::Acquire)),
            MASTER_MUTE => {
                if self.is_muted() {
                    1.0
                } else {
                    0.0
                }
            }
            FILTER_CUTOFF => u32_to_f32(self.filter_cutoff.load(Ordering::Acquire)),
            FILTER_RESONANCE => u32_to_f32(self.filter_resonance.load(Ordering::Acquire)),
            _ => 0.0,
        }
    }

    /// Point an XY pad axis at another parameter. Pads cannot target pads.
    pub fn set_xy_pad_parameter(&self, axis: XyAxis, parameter_id: i32) -> bool {
        if is_xy_passthrough(parameter_id) {
            warn!("XY pad cannot target pad parameter {parameter_id}");
            return false;
        }
        if Route::decode(parameter_id).is_none() {
            warn!("XY pad cannot target unknown parameter {parameter_id}");
            return false;
        }
        let slot = match axis {
            XyAxis::X => &self.xy_pad_x,
            XyAxis::Y => &self.xy_pad_y,
        };
        slot.store(parameter_id, Ordering::Release);
        debug!("XY pad {axis:?} now drives parameter {parameter_id}");
        true
    }

    pub fn xy_pad_parameter(&self, axis: XyAxis) -> i32 {
        match axis {
            XyAxis::X => self.xy_pad_x.load(Ordering::Acquire),
            XyAxis::Y => self.xy_pad_y.load(Ordering::Acquire),
        }
    }

    fn xy_target(&self, id: i32) -> Option<i32> {
        match id {
            XY_PAD_X => Some(self.xy_pad_x.load(Ordering::Acquire)),
            XY_PAD_Y => Some(self.xy_pad_y.load(Ordering::Acquire)),
            _ => None,
        }
    }

    /// Control-side half of a parameter change: mirrors and flags. Does not
    /// log, since the audio thread calls it during automation.
    fn dispatch(&self, route: Route, value: f32, oscillator_count: usize) -> Dispatch {
        match route {
            Route::MasterVolume => {
                if value.is_finite() {
                    self.master_volume
                        .store(f32_to_u32(value.clamp(0.0, 1.0)), Ordering::Release);
                }
                Dispatch::Forward
            }
            Route::MasterMute => {
                self.muted.store(value >= 0.5, Ordering::Release);
                Dispatch::Handled
            }
            Route::Filter(FilterField::Cutoff) => {
                self.filter_cutoff
                    .store(f32_to_u32(value), Ordering::Release);
                Dispatch::Forward
            }
            Route::Filter(FilterField::Resonance) => {
                self.filter_resonance
                    .store(f32_to_u32(value), Ordering::Release);
                Dispatch::Forward
            }
            Route::ChannelAftertouch | Route::GenericCc(_) => Dispatch::Handled,
            Route::Oscillator { slot, .. } if slot >= oscillator_count => Dispatch::Missing,
            // Pads resolve before dispatch; a pad here has no target
            Route::XyPad(_) => Dispatch::Missing,
            Route::PitchBend
            | Route::Filter(_)
            | Route::Envelope(_)
            | Route::Effect(_)
            | Route::Granular(_)
            | Route::Oscillator { .. } => Dispatch::Forward,
        }
    }

    /// Apply one replayed automation event from inside the audio callback.
    /// Same semantics as `set_parameter(id, value, true)` but applied to
    /// `path` directly and without blocking: a contended cache write is
    /// queued on the path and retried next block.
    pub(super) fn apply_from_audio(&self, path: &mut SignalPath, id: i32, value: f32) {
        self.cache_from_audio(path, id, value);

        let id = match self.xy_target(id) {
            Some(target) if is_xy_passthrough(target) => return,
            Some(target) => {
                self.cache_from_audio(path, target, value);
                target
            }
            None => id,
        };

        let Some(route) = Route::decode(id) else {
            return;
        };
        if let Dispatch::Forward = self.dispatch(route, value, path.oscillator_count()) {
            path.apply(route, value);
        }
    }

    fn cache_from_audio(&self, path: &mut SignalPath, id: i32, value: f32) {
        match self.parameters.try_lock() {
            Some(mut cache) => {
                cache.insert(id, value);
            }
            None => {
                if path.pending_cache.len() < path.pending_cache.capacity() {
                    path.pending_cache.push((id, value));
                }
            }
        }
    }

    /// Audio thread, after each block: flush deferred cache writes and
    /// replay whatever automation is due.
    pub(super) fn run_automation(&self, path: &mut SignalPath) {
        if !path.pending_cache.is_empty() {
            if let Some(mut cache) = self.parameters.try_lock() {
                for (id, value) in path.pending_cache.drain(..) {
                    cache.insert(id, value);
                }
            }
        }

        if !self.automation.is_playing() {
            return;
        }

        let mut due = std::mem::take(&mut path.automation_due);
        due.clear();
        if self.automation.drain_due(&mut due) > 0 {
            let callback = self
                .automation_callback
                .try_lock()
                .and_then(|callback| callback.clone());
            for &(id, value) in &due {
                self.apply_from_audio(path, id, value);
                if let Some(callback) = &callback {
                    callback(id, value);
                }
            }
        }
        due.clear();
        path.automation_due = due;
    }
}
