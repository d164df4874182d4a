//! Real-to-complex FFT processor for the audio callback
//!
//! The processor owns a pre-allocated workspace (window, windowed input,
//! complex spectrum, magnitude scratch) and performs the whole transform
//! in private buffers, so the hot path is allocation-free and lock-free
//! except for one short critical section: the final copy of the
//! magnitudes into the shared snapshot.
//!
//! # Snapshot discipline
//!
//! Readers go through a cloneable [`SpectrumHandle`]. The writer takes
//! the write lock only for a memcpy of N/2+1 values; readers hold the
//! read lock only for their own copy-out. A reader therefore observes
//! either the previous frame in full or the new frame in full, never a
//! partial mix, and the writer never waits longer than one memcpy.

use std::sync::Arc;

use parking_lot::RwLock;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::analysis::{AudioProcessor, FftResultProvider};
use crate::audio::AudioResult;

use super::error::{DspError, DspResult};
use super::pow2::is_power_of_two;
use super::window::WindowKind;

/// Normalization factor mapping i32 samples into [-1.0, 1.0).
const NORM_FACTOR: f64 = 1.0 / 2_147_483_648.0;

/// Shared spectrum state read by publishers and derived analyzers.
struct SpectrumShared {
    magnitudes: RwLock<Vec<f64>>,
    fft_size: usize,
    sample_rate: f64,
}

/// Cheaply cloneable read handle onto the latest magnitude spectrum.
#[derive(Clone)]
pub struct SpectrumHandle {
    shared: Arc<SpectrumShared>,
}

impl SpectrumHandle {
    /// Number of magnitude bins (fft_size / 2 + 1).
    pub fn magnitude_count(&self) -> usize {
        self.shared.fft_size / 2 + 1
    }
}

impl FftResultProvider for SpectrumHandle {
    fn magnitudes(&self) -> Vec<f64> {
        self.shared.magnitudes.read().clone()
    }

    fn magnitudes_into(&self, dest: &mut [f64]) -> DspResult<()> {
        let expected = self.magnitude_count();
        if dest.len() != expected {
            return Err(DspError::LengthMismatch {
                expected,
                got: dest.len(),
            });
        }
        let snapshot = self.shared.magnitudes.read();
        dest.copy_from_slice(&snapshot);
        Ok(())
    }

    fn frequency_for_bin(&self, bin: usize) -> f64 {
        if bin > self.shared.fft_size / 2 {
            return 0.0;
        }
        bin as f64 * self.shared.sample_rate / self.shared.fft_size as f64
    }

    fn fft_size(&self) -> usize {
        self.shared.fft_size
    }

    fn sample_rate(&self) -> f64 {
        self.shared.sample_rate
    }
}

/// FFT analyzer: windowing, real-to-complex transform, magnitude spectrum.
///
/// Runs inside the audio callback via [`AudioProcessor::process`];
/// results are read through [`SpectrumHandle`].
pub struct FftProcessor {
    fft: Arc<dyn RealToComplex<f64>>,
    fft_size: usize,

    /// Window coefficients, constant after construction.
    window: Vec<f64>,
    /// Windowed, normalized input for the current frame.
    input: Vec<f64>,
    /// Complex coefficients of the last transform.
    spectrum: Vec<Complex<f64>>,
    /// FFT scratch space required by realfft.
    scratch: Vec<Complex<f64>>,
    /// Private magnitude buffer, copied into the snapshot per frame.
    magnitude: Vec<f64>,

    handle: SpectrumHandle,
}

impl FftProcessor {
    /// Create a processor with all workspace pre-allocated.
    ///
    /// Fails when `fft_size` is not a positive power of two or when the
    /// sample rate is not positive.
    pub fn new(fft_size: usize, sample_rate: f64, window_kind: WindowKind) -> DspResult<Self> {
        if fft_size == 0 || !is_power_of_two(fft_size as i64) {
            return Err(DspError::InvalidFftSize(fft_size));
        }
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }

        let fft = RealFftPlanner::<f64>::new().plan_fft_forward(fft_size);
        let magnitude_count = fft_size / 2 + 1;

        let mut window = vec![0.0; fft_size];
        window_kind.fill(&mut window);

        log::info!(
            "fft: initializing processor (size {}, {:.1} Hz, {} window)",
            fft_size,
            sample_rate,
            window_kind.name()
        );

        let handle = SpectrumHandle {
            shared: Arc::new(SpectrumShared {
                magnitudes: RwLock::new(vec![0.0; magnitude_count]),
                fft_size,
                sample_rate,
            }),
        };

        Ok(Self {
            input: vec![0.0; fft_size],
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            magnitude: vec![0.0; magnitude_count],
            fft,
            fft_size,
            window,
            handle,
        })
    }

    /// Read handle for publishers and derived analyzers.
    pub fn handle(&self) -> SpectrumHandle {
        self.handle.clone()
    }
}

impl AudioProcessor for FftProcessor {
    fn name(&self) -> &'static str {
        "fft"
    }

    /// Window + normalize the input, transform, compute magnitudes, and
    /// publish the snapshot. Inputs shorter than the FFT size are
    /// zero-padded; excess samples are ignored. Allocation-free.
    fn process(&mut self, samples: &[i32]) {
        let used = samples.len().min(self.fft_size);
        for i in 0..used {
            self.input[i] = samples[i] as f64 * NORM_FACTOR * self.window[i];
        }
        for slot in &mut self.input[used..] {
            *slot = 0.0;
        }

        // Lengths are fixed at construction; realfft only errors on a
        // length mismatch, which cannot happen here.
        let _ = self
            .fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch);

        for (mag, c) in self.magnitude.iter_mut().zip(self.spectrum.iter()) {
            *mag = c.norm();
        }

        // Short exclusive section: memcpy of N/2+1 values.
        let mut snapshot = self.handle.shared.magnitudes.write();
        snapshot.copy_from_slice(&self.magnitude);
    }

    fn close(&mut self) -> AudioResult<()> {
        log::debug!("fft: closing processor (no resources to release)");
        Ok(())
    }
}
