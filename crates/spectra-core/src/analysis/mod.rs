//! Analysis chain contracts
//!
//! Analyzers run inside the audio callback in a fixed order decided at
//! engine construction: the FFT processor first, then derived analyzers
//! (band energy reading its snapshot, beat detection on the raw
//! samples). Downstream consumers (publisher, derived analyzers) depend
//! on [`FftResultProvider`], never on the concrete FFT implementation.

mod bands;
mod beat;

pub use bands::{BandEnergyProcessor, BandLevels, FrequencyBand, BANDS, BAND_COUNT};
pub use beat::{BeatDetector, BeatEvents, DEFAULT_BEAT_THRESHOLD, DEFAULT_MIN_ENERGY_RATIO};

use crate::audio::AudioResult;
use crate::dsp::DspResult;

/// A component that processes raw audio buffers.
///
/// `process` is called from the real-time audio callback: implementations
/// must not allocate, block, or log.
pub trait AudioProcessor: Send {
    /// Short identifier used in lifecycle logs.
    fn name(&self) -> &'static str;

    /// Analyze one buffer of samples. Buffers arrive in stream order.
    fn process(&mut self, samples: &[i32]);

    /// Release any resources held by the processor. Called outside the
    /// callback, in reverse registration order; must tolerate repeated
    /// calls.
    fn close(&mut self) -> AudioResult<()> {
        Ok(())
    }
}

/// Read access to the latest FFT results.
pub trait FftResultProvider: Send + Sync {
    /// Copy of the latest magnitude spectrum (length fft_size/2 + 1).
    /// Allocates; intended for non-realtime callers.
    fn magnitudes(&self) -> Vec<f64>;

    /// Copy the latest magnitudes into `dest` without allocating.
    /// `dest.len()` must equal fft_size/2 + 1.
    fn magnitudes_into(&self, dest: &mut [f64]) -> DspResult<()>;

    /// Center frequency in Hz for a bin index; 0.0 outside [0, N/2].
    fn frequency_for_bin(&self, bin: usize) -> f64;

    fn fft_size(&self) -> usize;

    fn sample_rate(&self) -> f64;
}
