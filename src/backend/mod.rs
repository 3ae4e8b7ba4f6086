//! Platform audio output.
//!
//! The engine never talks to a device directly. It hands a render closure
//! to an `AudioBackend`, which calls it once per block from whatever thread
//! the platform drives audio on.

#[cfg(feature = "cpal")]
pub mod cpal;
pub mod offline;

#[cfg(feature = "cpal")]
pub use self::cpal::CpalBackend;
pub use offline::{OfflineBackend, OfflineHandle};

use crate::error::BackendError;

/// Fills an interleaved output block.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub sample_rate: u32,
    /// Requested frames per block. Backends may fall back to the device
    /// default when the exact size is unsupported.
    pub buffer_size: u32,
    pub channels: u16,
}

pub trait AudioBackend: Send {
    /// Start calling `render` periodically. Fails without side effects if
    /// the platform cannot open a stream.
    fn start(&mut self, settings: StreamSettings, render: RenderCallback)
        -> Result<(), BackendError>;

    /// Stop the callback. When this returns, `render` is no longer running
    /// and has been dropped. Safe to call when not started.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// The platform backend when the `cpal` feature is on, otherwise an
/// offline backend nothing drives.
pub fn default_backend() -> Box<dyn AudioBackend> {
    #[cfg(feature = "cpal")]
    {
        Box::new(CpalBackend::new())
    }
    #[cfg(not(feature = "cpal"))]
    {
        Box::new(OfflineBackend::new())
    }
}
