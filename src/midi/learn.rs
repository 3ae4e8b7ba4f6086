use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// CC number → parameter id, with at most one CC per parameter.
#[derive(Debug, Default, Clone)]
pub struct CcMappingTable {
    cc_to_param: HashMap<u8, i32>,
    last_value: HashMap<u8, u8>,
}

impl CcMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `cc` to `parameter_id`. Any other CC already bound to that
    /// parameter is unbound first; returns it.
    pub fn assign(&mut self, cc: u8, parameter_id: i32) -> Option<u8> {
        let previous = self
            .cc_to_param
            .iter()
            .find(|(&other, &param)| param == parameter_id && other != cc)
            .map(|(&other, _)| other);

        if let Some(old) = previous {
            self.cc_to_param.remove(&old);
            self.last_value.remove(&old);
        }
        self.cc_to_param.insert(cc, parameter_id);
        previous
    }

    pub fn get(&self, cc: u8) -> Option<i32> {
        self.cc_to_param.get(&cc).copied()
    }

    pub fn cc_for(&self, parameter_id: i32) -> Option<u8> {
        self.cc_to_param
            .iter()
            .find(|(_, &param)| param == parameter_id)
            .map(|(&cc, _)| cc)
    }

    pub fn remember_value(&mut self, cc: u8, value: u8) {
        self.last_value.insert(cc, value);
    }

    pub fn last_value(&self, cc: u8) -> Option<u8> {
        self.last_value.get(&cc).copied()
    }

    /// Mappings sorted by CC number.
    pub fn snapshot(&self) -> Vec<(u8, i32)> {
        let mut mappings: Vec<_> = self.cc_to_param.iter().map(|(&cc, &p)| (cc, p)).collect();
        mappings.sort_unstable();
        mappings
    }

    pub fn len(&self) -> usize {
        self.cc_to_param.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cc_to_param.is_empty()
    }

    pub fn clear(&mut self) {
        self.cc_to_param.clear();
        self.last_value.clear();
    }
}

const NO_TARGET: i32 = -1;

/// Armed/disarmed MIDI-learn state. Lock free so the MIDI thread can poll
/// it on every CC.
#[derive(Debug)]
pub struct MidiLearn {
    active: AtomicBool,
    target: AtomicI32,
}

impl Default for MidiLearn {
    fn default() -> Self {
        Self {
            active: AtomicBool::new(false),
            target: AtomicI32::new(NO_TARGET),
        }
    }
}

impl MidiLearn {
    pub fn arm(&self, parameter_id: i32) {
        self.target.store(parameter_id, Ordering::Release);
        self.active.store(true, Ordering::Release);
    }

    pub fn disarm(&self) {
        self.active.store(false, Ordering::Release);
        self.target.store(NO_TARGET, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn target(&self) -> Option<i32> {
        if !self.is_active() {
            return None;
        }
        match self.target.load(Ordering::Acquire) {
            NO_TARGET => None,
            id => Some(id),
        }
    }

    /// Disarm and hand back the armed parameter. Only one caller wins when
    /// two CCs race for the same learn.
    pub fn take(&self) -> Option<i32> {
        self.active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        match self.target.swap(NO_TARGET, Ordering::AcqRel) {
            NO_TARGET => None,
            id => Some(id),
        }
    }
}
