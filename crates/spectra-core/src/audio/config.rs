//! Audio engine configuration
//!
//! The engine consumes a validated [`EngineConfig`]; validation happens
//! once at `AudioEngine::open` and maps violations onto
//! [`AudioError::InvalidConfig`](super::error::AudioError).

use serde::{Deserialize, Serialize};

use crate::dsp::{is_power_of_two, WindowKind};

use super::error::{AudioError, AudioResult};

/// Device id that selects the host default input device.
pub const DEFAULT_DEVICE_ID: i32 = -1;

/// Default capture sample rate (CD quality).
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Default frames per buffer; also the FFT size.
pub const DEFAULT_FRAMES_PER_BUFFER: usize = 1024;

/// Maximum frames per buffer the engine will pre-allocate for.
pub const MAX_FRAMES_PER_BUFFER: usize = 8192;

/// Usable sample rate bounds (Hz).
pub const MIN_SAMPLE_RATE: f64 = 8000.0;
pub const MAX_SAMPLE_RATE: f64 = 192_000.0;

/// Capture and analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Input device id; −1 selects the host default.
    pub input_device: i32,
    /// Capture sample rate in Hz.
    pub sample_rate: f64,
    /// Frames per capture buffer; a positive power of two. This is also
    /// the FFT size.
    pub frames_per_buffer: usize,
    /// Interleaved input channels (1 = mono). Analysis runs on channel 0.
    pub input_channels: usize,
    /// Prefer the smallest stable device buffer over the host default.
    pub low_latency: bool,
    /// FFT window function name; unknown names fall back to Hann.
    pub fft_window: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_device: DEFAULT_DEVICE_ID,
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            input_channels: 2,
            low_latency: false,
            fft_window: WindowKind::default().name().to_string(),
        }
    }
}

impl EngineConfig {
    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> AudioResult<()> {
        if self.frames_per_buffer == 0
            || self.frames_per_buffer > MAX_FRAMES_PER_BUFFER
            || !is_power_of_two(self.frames_per_buffer as i64)
        {
            return Err(AudioError::InvalidConfig(format!(
                "frames_per_buffer must be a power of two in [1, {}], got {}",
                MAX_FRAMES_PER_BUFFER, self.frames_per_buffer
            )));
        }
        if !self.sample_rate.is_finite()
            || self.sample_rate < MIN_SAMPLE_RATE
            || self.sample_rate > MAX_SAMPLE_RATE
        {
            return Err(AudioError::InvalidConfig(format!(
                "sample_rate must be in [{}, {}] Hz, got {}",
                MIN_SAMPLE_RATE, MAX_SAMPLE_RATE, self.sample_rate
            )));
        }
        if self.input_channels == 0 {
            return Err(AudioError::InvalidConfig(
                "input_channels must be at least 1".to_string(),
            ));
        }
        if self.input_device < DEFAULT_DEVICE_ID {
            return Err(AudioError::InvalidConfig(format!(
                "input_device must be a device id or {} for the default, got {}",
                DEFAULT_DEVICE_ID, self.input_device
            )));
        }
        Ok(())
    }

    /// Resolve the configured window name, downgrading unknown names to
    /// Hann with a warning (a diagnostic, not a fatal error).
    pub fn window_kind(&self) -> WindowKind {
        WindowKind::parse(&self.fft_window).unwrap_or_else(|e| {
            log::warn!("config: {}, defaulting to hann", e);
            WindowKind::Hann
        })
    }

    /// Number of magnitude bins produced per frame.
    pub fn magnitude_count(&self) -> usize {
        self.frames_per_buffer / 2 + 1
    }

    pub fn with_device(mut self, id: i32) -> Self {
        self.input_device = id;
        self
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_frames_per_buffer(mut self, frames: usize) -> Self {
        self.frames_per_buffer = frames;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.input_channels = channels;
        self
    }

    pub fn with_window(mut self, name: &str) -> Self {
        self.fft_window = name.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_non_power_of_two_frames() {
        for frames in [0usize, 3, 1000, MAX_FRAMES_PER_BUFFER + 1] {
            let cfg = EngineConfig::default().with_frames_per_buffer(frames);
            assert!(
                matches!(cfg.validate(), Err(AudioError::InvalidConfig(_))),
                "frames {} must be rejected",
                frames
            );
        }
    }

    #[test]
    fn test_rejects_bad_sample_rates() {
        for rate in [0.0, -1.0, 7999.0, 500_000.0, f64::NAN] {
            let cfg = EngineConfig::default().with_sample_rate(rate);
            assert!(cfg.validate().is_err(), "rate {} must be rejected", rate);
        }
    }

    #[test]
    fn test_rejects_zero_channels_and_bad_device_ids() {
        assert!(EngineConfig::default().with_channels(0).validate().is_err());
        assert!(EngineConfig::default().with_device(-2).validate().is_err());
        EngineConfig::default().with_device(-1).validate().unwrap();
        EngineConfig::default().with_device(3).validate().unwrap();
    }

    #[test]
    fn test_unknown_window_falls_back_to_hann() {
        let cfg = EngineConfig::default().with_window("kaiser");
        assert_eq!(cfg.window_kind(), WindowKind::Hann);

        let cfg = EngineConfig::default().with_window("Blackman");
        assert_eq!(cfg.window_kind(), WindowKind::Blackman);
    }

    #[test]
    fn test_magnitude_count() {
        let cfg = EngineConfig::default().with_frames_per_buffer(1024);
        assert_eq!(cfg.magnitude_count(), 513);
    }
}
