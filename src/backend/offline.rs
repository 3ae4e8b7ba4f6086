use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioBackend, RenderCallback, StreamSettings};
use crate::error::BackendError;

type Slot = Arc<Mutex<Option<RenderCallback>>>;

/// Backend with no device. The render callback is pulled manually through
/// an `OfflineHandle`, which is how tests and offline bounces drive the
/// engine.
pub struct OfflineBackend {
    slot: Slot,
    settings: Arc<Mutex<Option<StreamSettings>>>,
    failure: Option<String>,
}

/// Cloneable puller for an `OfflineBackend`.
#[derive(Clone)]
pub struct OfflineHandle {
    slot: Slot,
    settings: Arc<Mutex<Option<StreamSettings>>>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            settings: Arc::new(Mutex::new(None)),
            failure: None,
        }
    }

    /// A backend whose `start` always fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new()
        }
    }

    pub fn handle(&self) -> OfflineHandle {
        OfflineHandle {
            slot: self.slot.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OfflineBackend {
    fn start(
        &mut self,
        settings: StreamSettings,
        render: RenderCallback,
    ) -> Result<(), BackendError> {
        if let Some(reason) = &self.failure {
            return Err(BackendError::Unavailable(reason.clone()));
        }
        *self.settings.lock() = Some(settings);
        *self.slot.lock() = Some(render);
        Ok(())
    }

    fn stop(&mut self) {
        self.slot.lock().take();
        self.settings.lock().take();
    }

    fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

impl OfflineHandle {
    /// Run the render callback once over `output`. Returns false (and
    /// leaves `output` untouched) when the backend is not started.
    pub fn render(&self, output: &mut [f32]) -> bool {
        match self.slot.lock().as_mut() {
            Some(render) => {
                render(output);
                true
            }
            None => false,
        }
    }

    /// Render `frames` frames at the started channel count.
    pub fn render_frames(&self, frames: usize) -> Option<Vec<f32>> {
        let channels = self.settings()?.channels.max(1) as usize;
        let mut block = vec![0.0; frames * channels];
        self.render(&mut block).then_some(block)
    }

    pub fn settings(&self) -> Option<StreamSettings> {
        *self.settings.lock()
    }
}
