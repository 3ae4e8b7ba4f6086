//! Parameter automation: wall-clock recording and replay.
//!
//! ```text
//!            start_recording                 start_playback
//!   Idle ───────────────────→ Recording ───────────────────→ Playing
//!     ↑                           │ stop_recording              │ stop_playback
//!     └───────────────────────────┴─────────────────────────────┘
//! ```
//!
//! Recording and playback are mutually exclusive. Starting either one
//! turns the other off. The two flags are atomics so the router can check
//! "am I recording?" on every parameter write without taking the lock.
//!
//! Playback is drained once per audio block. Each track keeps a cursor
//! that only moves forward; every event whose timestamp has passed is
//! handed back to the engine, which applies it as an automation-originated
//! write so it is not recorded again.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationEvent {
    pub parameter_id: i32,
    pub value: f32,
    /// Seconds since recording started.
    pub timestamp: f64,
}

/// Per-parameter event lists, keyed by parameter id.
pub type AutomationTracks = BTreeMap<i32, Vec<AutomationEvent>>;

#[derive(Debug, Default)]
struct Track {
    events: Vec<AutomationEvent>,
    cursor: usize,
}

#[derive(Debug, Default)]
struct AutomationData {
    tracks: BTreeMap<i32, Track>,
    record_start: Option<Instant>,
    playback_start: Option<Instant>,
}

impl AutomationData {
    fn rewind(&mut self) {
        for track in self.tracks.values_mut() {
            track.cursor = 0;
        }
    }

    fn has_data(&self) -> bool {
        self.tracks.values().any(|t| !t.events.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct Automation {
    recording: AtomicBool,
    playing: AtomicBool,
    data: Mutex<AutomationData>,
}

impl Automation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Discard previous data and start capturing parameter writes.
    pub fn start_recording(&self) {
        let mut data = self.data.lock();
        data.tracks.clear();
        data.record_start = Some(Instant::now());
        data.playback_start = None;
        self.playing.store(false, Ordering::Release);
        self.recording.store(true, Ordering::Release);
        info!("automation recording started");
    }

    /// Stop capturing. Tracks are kept in arrival order, which is already
    /// time order.
    pub fn stop_recording(&self) {
        if self.recording.swap(false, Ordering::AcqRel) {
            let data = self.data.lock();
            let events: usize = data.tracks.values().map(|t| t.events.len()).sum();
            info!(
                "automation recording stopped: {} tracks, {events} events",
                data.tracks.len()
            );
        }
    }

    /// Rewind every track and start replaying. Returns false when there is
    /// nothing to play.
    pub fn start_playback(&self) -> bool {
        let mut data = self.data.lock();
        if !data.has_data() {
            warn!("automation playback requested with no recorded data");
            return false;
        }
        data.rewind();
        data.playback_start = Some(Instant::now());
        self.recording.store(false, Ordering::Release);
        self.playing.store(true, Ordering::Release);
        info!("automation playback started");
        true
    }

    pub fn stop_playback(&self) {
        if self.playing.swap(false, Ordering::AcqRel) {
            info!("automation playback stopped");
        }
    }

    /// Stop both modes and drop all tracks.
    pub fn clear(&self) {
        self.recording.store(false, Ordering::Release);
        self.playing.store(false, Ordering::Release);
        let mut data = self.data.lock();
        data.tracks.clear();
        data.record_start = None;
        data.playback_start = None;
        debug!("automation cleared");
    }

    pub fn has_data(&self) -> bool {
        self.data.lock().has_data()
    }

    /// Append one event stamped with the time since recording started.
    /// No-op unless recording.
    pub fn record(&self, parameter_id: i32, value: f32) {
        if !self.is_recording() {
            return;
        }
        let mut data = self.data.lock();
        let Some(start) = data.record_start else {
            return;
        };
        let timestamp = start.elapsed().as_secs_f64();
        data.tracks
            .entry(parameter_id)
            .or_default()
            .events
            .push(AutomationEvent {
                parameter_id,
                value,
                timestamp,
            });
    }

    /// Audio-thread drain: push every due `(id, value)` into `out`, never
    /// past `out`'s capacity so the push never reallocates. Skips the block
    /// entirely if the control side holds the lock.
    pub fn drain_due(&self, out: &mut Vec<(i32, f32)>) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let Some(mut data) = self.data.try_lock() else {
            return 0;
        };
        let Some(start) = data.playback_start else {
            return 0;
        };
        let elapsed = start.elapsed().as_secs_f64();
        Self::drain_until(&mut data, elapsed, out)
    }

    /// Drain against an explicit playback time instead of the wall clock.
    pub fn drain_due_at(&self, elapsed_seconds: f64, out: &mut Vec<(i32, f32)>) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let mut data = self.data.lock();
        Self::drain_until(&mut data, elapsed_seconds, out)
    }

    fn drain_until(data: &mut AutomationData, elapsed: f64, out: &mut Vec<(i32, f32)>) -> usize {
        let limit = out.capacity();
        let before = out.len();
        'tracks: for track in data.tracks.values_mut() {
            while let Some(event) = track.events.get(track.cursor) {
                if event.timestamp > elapsed {
                    break;
                }
                if out.len() >= limit {
                    // Leave the rest for the next block
                    break 'tracks;
                }
                out.push((event.parameter_id, event.value));
                track.cursor += 1;
            }
        }
        out.len() - before
    }

    /// Copy of every non-empty track.
    pub fn tracks(&self) -> AutomationTracks {
        self.data
            .lock()
            .tracks
            .iter()
            .filter(|(_, t)| !t.events.is_empty())
            .map(|(&id, t)| (id, t.events.clone()))
            .collect()
    }

    /// Replace all tracks wholesale (preset load). Each track is sorted by
    /// timestamp and every cursor rewound.
    pub fn replace_tracks(&self, tracks: AutomationTracks) {
        let mut data = self.data.lock();
        data.tracks = tracks
            .into_iter()
            .map(|(id, mut events)| {
                events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
                (id, Track { events, cursor: 0 })
            })
            .collect();
    }
}
