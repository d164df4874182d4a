//! Noise gate with branchless peak detection
//!
//! The gate decides, per capture buffer, whether the analysis chain runs
//! at all. State is two scalars behind relaxed atomics: a control thread
//! may flip the enable flag or retune the threshold while the audio
//! callback reads them. The threshold is stored as an i32 so the hot
//! path never touches floating point.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Default threshold ratio (~0.1% of full scale).
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.001;

/// Peak absolute amplitude of a buffer, computed branch-free.
///
/// `mask = s >> 31` is all-ones for negative samples, so
/// `(s ^ mask) - mask` is |s|; the running maximum folds each new value
/// in with `peak += (diff & (diff >> 31)) ^ diff`. Arithmetic wraps for
/// `i32::MIN`, whose absolute value is not representable.
pub fn peak_amplitude(samples: &[i32]) -> i32 {
    let mut peak = 0i32;
    for &sample in samples {
        let mask = sample >> 31;
        let amplitude = (sample ^ mask).wrapping_sub(mask);
        let diff = amplitude.wrapping_sub(peak);
        peak = peak.wrapping_add((diff & (diff >> 31)) ^ diff);
    }
    peak
}

/// Amplitude gate controlling whether downstream analyzers run.
///
/// The gate never modifies samples.
pub struct NoiseGate {
    enabled: AtomicBool,
    /// Absolute amplitude threshold in [0, i32::MAX].
    threshold: AtomicI32,
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseGate {
    /// Gate enabled with the default threshold (~0.1% of full scale).
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            threshold: AtomicI32::new(i32::MAX / 1000),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Set the threshold from a ratio in [0, 1]; out-of-range values
    /// clamp to the endpoints. 0 keeps the gate always open for any
    /// non-silent buffer, 1 closes it for everything.
    pub fn set_threshold_ratio(&self, ratio: f64) {
        let clamped = ratio.clamp(0.0, 1.0);
        self.threshold
            .store((clamped * i32::MAX as f64) as i32, Ordering::Relaxed);
    }

    /// Current threshold as a ratio in [0, 1].
    pub fn threshold_ratio(&self) -> f64 {
        self.threshold.load(Ordering::Relaxed) as f64 / i32::MAX as f64
    }

    /// Decide whether this buffer passes: disabled gates always pass;
    /// enabled gates require the peak to exceed the threshold.
    pub fn should_process(&self, samples: &[i32]) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return true;
        }
        peak_amplitude(samples) > self.threshold.load(Ordering::Relaxed)
    }
}
