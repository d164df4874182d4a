//! Audio engine error types

use thiserror::Error;

use crate::dsp::DspError;

/// Errors that can occur while configuring or running the audio engine
#[derive(Error, Debug)]
pub enum AudioError {
    /// Configuration rejected at engine construction
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No audio input devices available
    #[error("no audio input devices found")]
    NoDevices,

    /// Failed to get the default device
    #[error("failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Requested device id does not exist
    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    /// Selected device offers no input channels
    #[error("device '{0}' has no input channels")]
    NoInputChannels(String),

    /// Failed to query device configuration
    #[error("failed to get device config: {0}")]
    ConfigError(String),

    /// Device cannot deliver the sample format the engine requires
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Failed to build the input stream
    #[error("failed to build audio stream: {0}")]
    StreamBuild(String),

    /// Failed to start/resume the input stream
    #[error("failed to start audio stream: {0}")]
    StreamPlay(String),

    /// Failed to pause the input stream
    #[error("failed to stop audio stream: {0}")]
    StreamStop(String),

    /// Lifecycle operation on an engine that was already closed
    #[error("audio engine is closed")]
    Closed,

    /// DSP-layer failure surfaced during engine construction
    #[error(transparent)]
    Dsp(#[from] DspError),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
