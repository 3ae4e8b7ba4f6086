use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use ::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info, warn};

use super::{AudioBackend, RenderCallback, StreamSettings};
use crate::error::BackendError;

/*
cpal streams are not `Send`, so the stream cannot live inside the engine
(which is shared across threads). Instead a small owner thread builds the
stream, reports whether it started, then parks on a channel until told to
stop. Dropping the stream on that thread stops the callback.

    start()                       owner thread
      │ spawn ───────────────────→ build + play stream
      │ ←──────── Ok / Err ─────── │
      │                            │ (blocks on stop channel)
    stop() ── () ────────────────→ │ drop(stream)
      │ join ←──────────────────── ┘
*/

struct Worker {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// Default output device through cpal, f32 samples.
#[derive(Default)]
pub struct CpalBackend {
    worker: Option<Worker>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn open_stream(
    settings: StreamSettings,
    mut render: RenderCallback,
) -> Result<::cpal::Stream, BackendError> {
    let host = ::cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(BackendError::NoOutputDevice)?;
    let default_config = device
        .default_output_config()
        .map_err(|e| BackendError::DefaultConfig(e.to_string()))?;

    if default_config.sample_format() != ::cpal::SampleFormat::F32 {
        warn!(
            "default output format is {:?}, requesting f32 anyway",
            default_config.sample_format()
        );
    }

    // Fixed sizes are not supported everywhere
    let buffer_size = match default_config.buffer_size() {
        ::cpal::SupportedBufferSize::Range { min, max }
            if (*min..=*max).contains(&settings.buffer_size) =>
        {
            ::cpal::BufferSize::Fixed(settings.buffer_size)
        }
        _ => {
            warn!(
                "buffer of {} frames not supported by the device, using its default",
                settings.buffer_size
            );
            ::cpal::BufferSize::Default
        }
    };

    let config = ::cpal::StreamConfig {
        channels: settings.channels,
        sample_rate: ::cpal::SampleRate(settings.sample_rate),
        buffer_size,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _| render(data),
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| BackendError::BuildStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| BackendError::PlayStream(e.to_string()))?;

    info!(
        "cpal output started: {} Hz, {} channels, {:?}",
        config.sample_rate.0, config.channels, config.buffer_size
    );
    Ok(stream)
}

impl AudioBackend for CpalBackend {
    fn start(
        &mut self,
        settings: StreamSettings,
        render: RenderCallback,
    ) -> Result<(), BackendError> {
        self.stop();

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), BackendError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("synther-audio".into())
            .spawn(move || match open_stream(settings, render) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Returns on stop() or when the backend is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|e| BackendError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(Worker { stop_tx, thread });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(BackendError::Unavailable(
                    "audio thread exited before reporting".into(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.thread.join().is_err() {
                error!("audio owner thread panicked");
            }
            info!("cpal output stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        // Signal only. The owner thread drops the stream on its own.
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
        }
    }
}
