//! Real-time audio capture engine
//!
//! Owns the cpal input stream and the analysis chain. The chain runs in
//! the audio callback in a fixed order (FFT first, derived analyzers
//! after); the gate decides per buffer whether the chain runs at all.
//!
//! # Hot path
//!
//! `CallbackState::handle_buffer` is the code that runs per capture
//! buffer: gate check, channel-0 extraction into a pre-allocated mono
//! buffer, then each processor in order. It never allocates, logs, or
//! takes a lock that a non-realtime thread holds for more than a memcpy
//! (the state mutex is only ever contended during engine shutdown, after
//! the stream has stopped).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use parking_lot::Mutex;

use crate::analysis::{
    AudioProcessor, BandEnergyProcessor, BandLevels, BeatDetector, BeatEvents,
    DEFAULT_BEAT_THRESHOLD, DEFAULT_MIN_ENERGY_RATIO,
};
use crate::dsp::{FftProcessor, SpectrumHandle};

use super::config::EngineConfig;
use super::device::{self, DeviceInfo};
use super::error::{AudioError, AudioResult};
use super::gate::NoiseGate;

/// Per-buffer processing state, owned by the stream callback.
pub(crate) struct CallbackState {
    gate: Arc<NoiseGate>,
    chain: Vec<Box<dyn AudioProcessor>>,
    /// Channel-0 samples, extracted by stride for multichannel input.
    mono: Vec<i32>,
    /// Interleaved channels in the device buffer.
    channels: usize,
}

impl CallbackState {
    fn new(gate: Arc<NoiseGate>, chain: Vec<Box<dyn AudioProcessor>>, frames: usize, channels: usize) -> Self {
        Self {
            gate,
            chain,
            mono: vec![0; frames],
            channels,
        }
    }

    /// Process one capture buffer. Hot path: no allocation, no logging.
    fn handle_buffer(&mut self, samples: &[i32]) {
        if !self.gate.should_process(samples) {
            return;
        }

        if self.channels <= 1 {
            for processor in &mut self.chain {
                processor.process(samples);
            }
        } else {
            let frames = (samples.len() / self.channels).min(self.mono.len());
            for i in 0..frames {
                self.mono[i] = samples[i * self.channels];
            }
            for processor in &mut self.chain {
                processor.process(&self.mono[..frames]);
            }
        }
    }

    /// Close every processor in reverse registration order, returning
    /// the first error but attempting all of them.
    fn close_all(&mut self) -> AudioResult<()> {
        let mut first_err = None;
        for processor in self.chain.iter_mut().rev() {
            if let Err(e) = processor.close() {
                log::error!("audio: error closing {}: {}", processor.name(), e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Find a device input config that can deliver i32 samples at the
/// configured rate, preferring the exact channel count and falling back
/// to whatever channel count the device offers.
fn negotiate_input_config(
    device: &cpal::Device,
    config: &EngineConfig,
) -> AudioResult<(StreamConfig, usize)> {
    let target_rate = config.sample_rate as u32;
    let target_channels = config.input_channels as u16;

    let ranges: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|r| r.sample_format() == SampleFormat::I32)
        .filter(|r| r.min_sample_rate().0 <= target_rate && r.max_sample_rate().0 >= target_rate)
        .collect();

    let range = ranges
        .iter()
        .find(|r| r.channels() == target_channels)
        .or_else(|| ranges.first())
        .ok_or_else(|| {
            AudioError::UnsupportedFormat(format!(
                "no i32 input config at {} Hz (channels {})",
                target_rate, target_channels
            ))
        })?;

    let channels = range.channels();
    if channels != target_channels {
        log::warn!(
            "audio: device cannot capture {} channels, using {}",
            target_channels,
            channels
        );
    }

    let buffer_size = if config.low_latency {
        BufferSize::Fixed(config.frames_per_buffer as u32)
    } else {
        BufferSize::Default
    };

    Ok((
        StreamConfig {
            channels,
            sample_rate: SampleRate(target_rate),
            buffer_size,
        },
        channels as usize,
    ))
}

/// Capture engine: device, stream lifecycle, analysis chain, publisher.
pub struct AudioEngine {
    config: EngineConfig,
    device: cpal::Device,
    device_info: DeviceInfo,
    stream_config: StreamConfig,

    gate: Arc<NoiseGate>,
    spectrum: SpectrumHandle,
    band_levels: BandLevels,
    beat_events: BeatEvents,

    /// Shared with the stream data callback; only contended at shutdown.
    callback: Arc<Mutex<CallbackState>>,
    stream: Option<cpal::Stream>,
    publisher: Option<crate::net::Publisher>,

    /// Stream overruns / errors reported by the host.
    stream_errors: Arc<AtomicU64>,
    closed: bool,
}

impl AudioEngine {
    /// Validate the configuration, select the input device, and build
    /// the analysis chain. The stream itself is not opened until
    /// [`start`](Self::start).
    pub fn open(config: EngineConfig) -> AudioResult<AudioEngine> {
        config.validate()?;
        let window_kind = config.window_kind();

        let (device, device_info) = device::input_device(config.input_device)?;
        log::info!("audio: using input device {}", device_info);

        let (stream_config, channels) = negotiate_input_config(&device, &config)?;
        log::info!(
            "audio: stream config: {} channels, {} Hz, {} frames/buffer ({} latency)",
            stream_config.channels,
            stream_config.sample_rate.0,
            config.frames_per_buffer,
            if config.low_latency { "low" } else { "default" },
        );

        let fft = FftProcessor::new(config.frames_per_buffer, config.sample_rate, window_kind)?;
        let spectrum = fft.handle();

        let bands = BandEnergyProcessor::new(Arc::new(spectrum.clone()));
        let band_levels = bands.levels();

        let beat = BeatDetector::new(DEFAULT_BEAT_THRESHOLD, DEFAULT_MIN_ENERGY_RATIO);
        let beat_events = beat.events();

        // Canonical chain order: FFT writes the snapshot, derived
        // analyzers read it afterwards in the same callback.
        let chain: Vec<Box<dyn AudioProcessor>> =
            vec![Box::new(fft), Box::new(bands), Box::new(beat)];

        let gate = Arc::new(NoiseGate::new());
        let callback = Arc::new(Mutex::new(CallbackState::new(
            gate.clone(),
            chain,
            config.frames_per_buffer,
            channels,
        )));

        Ok(AudioEngine {
            config,
            device,
            device_info,
            stream_config,
            gate,
            spectrum,
            band_levels,
            beat_events,
            callback,
            stream: None,
            publisher: None,
            stream_errors: Arc::new(AtomicU64::new(0)),
            closed: false,
        })
    }

    /// Append a processor to the analysis chain. Must be called before
    /// [`start`](Self::start); later processors see the results earlier
    /// ones wrote into shared workspaces.
    pub fn register(&mut self, processor: Box<dyn AudioProcessor>) {
        log::info!("audio: registering processor '{}'", processor.name());
        self.callback.lock().chain.push(processor);
    }

    /// Attach a publisher whose lifecycle follows the engine: started
    /// with `start`, stopped first on the way down.
    pub fn attach_publisher(&mut self, publisher: crate::net::Publisher) {
        self.publisher = Some(publisher);
    }

    /// Open (if needed) and start the input stream, then the publisher.
    /// Idempotent: a running engine stays running.
    pub fn start(&mut self) -> AudioResult<()> {
        if self.closed {
            return Err(AudioError::Closed);
        }

        if self.stream.is_none() {
            let state = self.callback.clone();
            let errors = self.stream_errors.clone();

            let stream = self
                .device
                .build_input_stream(
                    &self.stream_config,
                    move |data: &[i32], _: &cpal::InputCallbackInfo| {
                        state.lock().handle_buffer(data);
                    },
                    move |err| {
                        errors.fetch_add(1, Ordering::Relaxed);
                        log::error!("audio: input stream error: {}", err);
                    },
                    None,
                )
                .map_err(|e| AudioError::StreamBuild(e.to_string()))?;
            self.stream = Some(stream);
        }

        if let Some(stream) = &self.stream {
            stream
                .play()
                .map_err(|e| AudioError::StreamPlay(e.to_string()))?;
        }

        if let Some(publisher) = &mut self.publisher {
            publisher.start();
        }

        log::info!("audio: engine started");
        Ok(())
    }

    /// Stop the publisher, then pause the stream. Idempotent.
    pub fn stop(&mut self) -> AudioResult<()> {
        if let Some(publisher) = &mut self.publisher {
            publisher.stop();
        }

        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| AudioError::StreamStop(e.to_string()))?;
            log::info!("audio: engine stopped");
        }
        Ok(())
    }

    /// Ensure the engine is stopped, drop the stream, and close chain
    /// components in reverse registration order. Returns the first
    /// error while attempting all cleanup. Idempotent.
    pub fn close(&mut self) -> AudioResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_err = None;

        if let Err(e) = self.stop() {
            log::error!("audio: error stopping engine during close: {}", e);
            first_err = Some(e);
        }

        // Dropping the stream tears down the callback before we touch
        // the chain.
        self.stream = None;
        self.publisher = None;

        if let Err(e) = self.callback.lock().close_all() {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }

        log::info!(
            "audio: engine closed ({} stream errors observed)",
            self.stream_errors.load(Ordering::Relaxed)
        );
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Gate control surface, shared with the callback.
    pub fn gate(&self) -> Arc<NoiseGate> {
        self.gate.clone()
    }

    /// Read handle onto the latest FFT magnitudes.
    pub fn spectrum(&self) -> SpectrumHandle {
        self.spectrum.clone()
    }

    /// Lock-free per-band levels from the band energy analyzer.
    pub fn band_levels(&self) -> BandLevels {
        self.band_levels.clone()
    }

    /// Lock-free kick detections from the beat detector.
    pub fn beat_events(&self) -> BeatEvents {
        self.beat_events.clone()
    }

    /// Stream errors (overruns and the like) reported by the host.
    pub fn stream_error_count(&self) -> u64 {
        self.stream_errors.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("audio: error closing engine on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Chain probe that records every buffer it sees.
    struct Probe {
        buffers: Arc<StdMutex<Vec<Vec<i32>>>>,
        closed: Arc<StdMutex<Vec<&'static str>>>,
        label: &'static str,
    }

    impl AudioProcessor for Probe {
        fn name(&self) -> &'static str {
            self.label
        }

        fn process(&mut self, samples: &[i32]) {
            self.buffers.lock().unwrap().push(samples.to_vec());
        }

        fn close(&mut self) -> AudioResult<()> {
            self.closed.lock().unwrap().push(self.label);
            Ok(())
        }
    }

    fn probe(label: &'static str) -> (Probe, Arc<StdMutex<Vec<Vec<i32>>>>, Arc<StdMutex<Vec<&'static str>>>) {
        let buffers = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(StdMutex::new(Vec::new()));
        (
            Probe {
                buffers: buffers.clone(),
                closed: closed.clone(),
                label,
            },
            buffers,
            closed,
        )
    }

    #[test]
    fn test_mono_input_passes_through_unchanged() {
        let (p, buffers, _) = probe("probe");
        let gate = Arc::new(NoiseGate::new());
        gate.set_enabled(false);
        let mut state = CallbackState::new(gate, vec![Box::new(p)], 8, 1);

        let samples = [1, -2, 3, -4, 5, -6, 7, -8];
        state.handle_buffer(&samples);

        let seen = buffers.lock().unwrap();
        assert_eq!(seen.as_slice(), &[samples.to_vec()]);
    }

    #[test]
    fn test_stereo_input_extracts_channel_zero() {
        let (p, buffers, _) = probe("probe");
        let gate = Arc::new(NoiseGate::new());
        gate.set_enabled(false);
        let mut state = CallbackState::new(gate, vec![Box::new(p)], 4, 2);

        // Interleaved L/R: channel 0 is 10, 20, 30, 40.
        let samples = [10, -1, 20, -2, 30, -3, 40, -4];
        state.handle_buffer(&samples);

        let seen = buffers.lock().unwrap();
        assert_eq!(seen.as_slice(), &[vec![10, 20, 30, 40]]);
    }

    #[test]
    fn test_oversized_buffer_is_capped_to_frames() {
        let (p, buffers, _) = probe("probe");
        let gate = Arc::new(NoiseGate::new());
        gate.set_enabled(false);
        let mut state = CallbackState::new(gate, vec![Box::new(p)], 2, 2);

        let samples = [1, 0, 2, 0, 3, 0, 4, 0];
        state.handle_buffer(&samples);

        let seen = buffers.lock().unwrap();
        assert_eq!(seen.as_slice(), &[vec![1, 2]]);
    }

    #[test]
    fn test_gate_blocks_quiet_buffers() {
        let (p, buffers, _) = probe("probe");
        let gate = Arc::new(NoiseGate::new());
        gate.set_threshold_ratio(0.1);
        let mut state = CallbackState::new(gate.clone(), vec![Box::new(p)], 8, 1);

        // Peak ~2^31/10000, far below the 0.1 threshold.
        let quiet = [214_748, -214_748, 100, -100, 0, 0, 0, 0];
        state.handle_buffer(&quiet);
        assert!(buffers.lock().unwrap().is_empty(), "gated buffer must not reach the chain");

        gate.set_threshold_ratio(0.0);
        state.handle_buffer(&quiet);
        assert_eq!(buffers.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_disabled_gate_processes_everything() {
        let (p, buffers, _) = probe("probe");
        let gate = Arc::new(NoiseGate::new());
        gate.set_enabled(false);
        gate.set_threshold_ratio(1.0);
        let mut state = CallbackState::new(gate, vec![Box::new(p)], 4, 1);

        state.handle_buffer(&[0, 0, 0, 0]);
        assert_eq!(buffers.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_chain_closes_in_reverse_order() {
        let (first, _, closed) = probe("first");
        let (second, _, _) = probe("second");
        let second = Probe {
            closed: closed.clone(),
            ..second
        };
        let gate = Arc::new(NoiseGate::new());
        let mut state =
            CallbackState::new(gate, vec![Box::new(first), Box::new(second)], 4, 1);

        state.close_all().unwrap();
        assert_eq!(closed.lock().unwrap().as_slice(), &["second", "first"]);
    }

    #[test]
    fn test_open_rejects_invalid_config_before_touching_devices() {
        let bad = EngineConfig::default().with_frames_per_buffer(1000);
        match AudioEngine::open(bad) {
            Err(AudioError::InvalidConfig(_)) => {}
            Err(e) => panic!("expected InvalidConfig, got {}", e),
            Ok(_) => panic!("invalid config must not open"),
        }
    }

    #[test]
    fn test_chain_buffers_stay_in_place_across_frames() {
        let gate = Arc::new(NoiseGate::new());
        gate.set_enabled(false);
        let fft = FftProcessor::new(1024, 44100.0, crate::dsp::WindowKind::Hann).unwrap();
        let mut state = CallbackState::new(gate, vec![Box::new(fft)], 1024, 2);

        let samples = vec![1_000_000i32; 2048];
        state.handle_buffer(&samples);
        let ptr = state.mono.as_ptr();
        let cap = state.mono.capacity();

        for _ in 0..1000 {
            state.handle_buffer(&samples);
        }
        assert_eq!(ptr, state.mono.as_ptr());
        assert_eq!(cap, state.mono.capacity());
    }
}
