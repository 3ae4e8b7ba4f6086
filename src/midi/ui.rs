use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

/*
UI Channel (MIDI channel 16)
============================

Control-surface metadata, never sound. Every CC on this channel is
consumed; none reaches the parameter router.

| CC        | meaning                                   |
| --------- | ----------------------------------------- |
| 32        | set target panel id (value % 128)         |
| 0         | panel id MSB, reserved, ignored           |
| 109       | cycle target panel, wrapping at 128       |
| 102..=108 | forwarded to the UI callback              |
| 110       | forwarded to the UI callback              |
| other     | swallowed                                 |
*/

pub const CC_PANEL_ID_MSB: u8 = 0;
pub const CC_PANEL_ID_LSB: u8 = 32;
pub const CC_CYCLE_PANEL: u8 = 109;

/// `(panel_id, cc_number, cc_value)`
pub type UiControlCallback = Arc<dyn Fn(u8, u8, u8) + Send + Sync>;

#[derive(Default)]
pub struct UiRouter {
    panel: AtomicU8,
    callback: Mutex<Option<UiControlCallback>>,
}

impl UiRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_panel(&self) -> u8 {
        self.panel.load(Ordering::Acquire)
    }

    pub fn set_callback(&self, callback: Option<UiControlCallback>) {
        *self.callback.lock() = callback;
    }

    /// Handle a CC on the UI channel. Always consumes the message.
    pub fn handle_cc(&self, controller: u8, value: u8) -> bool {
        match controller {
            CC_PANEL_ID_LSB => {
                self.panel.store(value % 128, Ordering::Release);
                info!("UI target panel set to {}", value % 128);
            }
            CC_PANEL_ID_MSB => {
                debug!("UI panel id MSB ({value}) ignored");
            }
            CC_CYCLE_PANEL => {
                let next = self
                    .panel
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| Some((p + 1) % 128))
                    .map_or(0, |prev| (prev + 1) % 128);
                info!("UI target panel cycled to {next}");
            }
            102..=108 | 110 => {
                // Clone out so the callback runs without the lock held
                let callback = self.callback.lock().clone();
                match callback {
                    Some(callback) => callback(self.target_panel(), controller, value),
                    None => debug!("UI CC {controller} received but no UI callback registered"),
                }
            }
            _ => {}
        }
        true
    }

    pub fn reset(&self) {
        self.panel.store(0, Ordering::Release);
    }
}
