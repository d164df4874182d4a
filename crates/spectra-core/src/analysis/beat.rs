//! Kick onset detection from buffer energy
//!
//! Derived analyzer that watches the RMS energy of each capture buffer
//! and flags a kick when the energy jumps sharply from the previous
//! buffer. Runs in the chain after the FFT processor; detections are
//! published through a lock-free counter handle so control threads can
//! poll without touching the audio path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::AudioResult;

use super::AudioProcessor;

/// Default RMS energy floor below which no detection fires.
pub const DEFAULT_BEAT_THRESHOLD: f64 = 0.01;

/// Default minimum energy ratio (current / previous) for an onset.
pub const DEFAULT_MIN_ENERGY_RATIO: f64 = 1.5;

/// RMS energy of a buffer, normalized to [0, 1].
fn buffer_rms(samples: &[i32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sum_square = 0.0;
    for &sample in samples {
        let x = sample as f64 / i32::MAX as f64;
        sum_square += x * x;
    }
    (sum_square / samples.len() as f64).sqrt()
}

/// Lock-free view of kick detections.
#[derive(Clone)]
pub struct BeatEvents {
    kicks: Arc<AtomicU64>,
}

impl BeatEvents {
    fn new() -> Self {
        Self {
            kicks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total kicks detected since construction.
    pub fn kick_count(&self) -> u64 {
        self.kicks.load(Ordering::Relaxed)
    }

    fn record_kick(&self) {
        self.kicks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Detects kick drum hits from energy changes between buffers.
///
/// A buffer triggers when its RMS energy exceeds the threshold and
/// either no previous energy exists or the energy grew by at least the
/// configured ratio. Sustained loud passages therefore fire once, on
/// the rising edge.
pub struct BeatDetector {
    /// Energy floor for detection.
    threshold: f64,
    /// Minimum ratio increase over the previous buffer.
    min_energy_ratio: f64,
    /// Energy of the previous buffer.
    last_energy: f64,
    events: BeatEvents,
}

impl BeatDetector {
    pub fn new(threshold: f64, min_energy_ratio: f64) -> Self {
        log::info!(
            "analysis: initializing beat detector (threshold {:.2}, min ratio {:.2})",
            threshold,
            min_energy_ratio
        );
        Self {
            threshold,
            min_energy_ratio,
            last_energy: 0.0,
            events: BeatEvents::new(),
        }
    }

    /// Lock-free handle for control-thread reads.
    pub fn events(&self) -> BeatEvents {
        self.events.clone()
    }
}

impl AudioProcessor for BeatDetector {
    fn name(&self) -> &'static str {
        "beat"
    }

    fn process(&mut self, samples: &[i32]) {
        let current_energy = buffer_rms(samples);

        if current_energy > self.threshold
            && (self.last_energy == 0.0
                || current_energy / self.last_energy > self.min_energy_ratio)
        {
            self.events.record_kick();
        }

        self.last_energy = current_energy;
    }

    fn close(&mut self) -> AudioResult<()> {
        log::debug!("analysis: closing beat detector");
        Ok(())
    }
}
