use thiserror::Error;

/// Lifecycle failures. Control-path calls report `false` instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio backend failed: {0}")]
    Backend(#[from] BackendError),

    #[error("could not allocate analysis buffers for an FFT of size {fft_size}")]
    AnalysisAllocation { fft_size: usize },

    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("invalid buffer size {0}")]
    InvalidBufferSize(u32),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no output device available")]
    NoOutputDevice,

    #[error("failed to query the default output config: {0}")]
    DefaultConfig(String),

    #[error("failed to build the output stream: {0}")]
    BuildStream(String),

    #[error("failed to start the output stream: {0}")]
    PlayStream(String),

    #[error("failed to spawn the audio thread: {0}")]
    ThreadSpawn(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize preset: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("preset root must be a JSON object")]
    NotAnObject,

    #[error("engine is not initialized")]
    NotInitialized,
}
