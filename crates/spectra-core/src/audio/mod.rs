//! Audio capture: device selection, noise gate, and the real-time engine
//!
//! The engine owns the host input stream and runs the analysis chain
//! inside the stream callback. Control state (gate flags, band levels)
//! is shared through atomics so control threads never contend with the
//! hot path.

mod config;
mod device;
mod engine;
mod error;
mod gate;

pub use config::{
    EngineConfig, DEFAULT_DEVICE_ID, DEFAULT_FRAMES_PER_BUFFER, DEFAULT_SAMPLE_RATE,
    MAX_FRAMES_PER_BUFFER, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE,
};
pub use device::{host_devices, input_device, DeviceInfo};
pub use engine::AudioEngine;
pub use error::{AudioError, AudioResult};
pub use gate::{peak_amplitude, NoiseGate, DEFAULT_THRESHOLD_RATIO};
