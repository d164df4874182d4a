//! Frequency band energy extraction
//!
//! Derived analyzer that sums squared magnitudes over six fixed bands
//! (sub through treble) and publishes the root of each band's mean
//! energy, scaled and clamped into [0, 1] as a display-ready level.
//! Runs in the chain after the FFT processor and reads its snapshot
//! through [`FftResultProvider`]; per-band levels are published through
//! lock-free atomics so control threads can poll them without touching
//! the audio path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::AudioResult;

use super::{AudioProcessor, FftResultProvider};

/// Number of frequency bands.
pub const BAND_COUNT: usize = 6;

/// Name and frequency range of one energy band.
#[derive(Debug, Clone, Copy)]
pub struct FrequencyBand {
    pub name: &'static str,
    pub low_hz: f64,
    pub high_hz: f64,
}

/// Band table. The treble ceiling is capped to Nyquist at construction.
pub const BANDS: [FrequencyBand; BAND_COUNT] = [
    FrequencyBand { name: "sub", low_hz: 20.0, high_hz: 60.0 },
    FrequencyBand { name: "bass", low_hz: 60.0, high_hz: 250.0 },
    FrequencyBand { name: "low-mid", low_hz: 250.0, high_hz: 500.0 },
    FrequencyBand { name: "mid", low_hz: 500.0, high_hz: 2000.0 },
    FrequencyBand { name: "high-mid", low_hz: 2000.0, high_hz: 4000.0 },
    FrequencyBand { name: "treble", low_hz: 4000.0, high_hz: f64::INFINITY },
];

/// Empirical scaling applied to the root-mean band energy so typical
/// program material lands in [0, 1] before clamping.
const BAND_ENERGY_SCALE: f64 = 50.0;

/// Lock-free view of the latest per-band levels, each in [0, 1]
/// (f64 bit patterns).
#[derive(Clone)]
pub struct BandLevels {
    levels: Arc<[AtomicU64; BAND_COUNT]>,
}

impl BandLevels {
    fn new() -> Self {
        Self {
            levels: Arc::new(std::array::from_fn(|_| AtomicU64::new(0))),
        }
    }

    /// Latest level for one band.
    pub fn level(&self, band: usize) -> f64 {
        f64::from_bits(self.levels[band].load(Ordering::Relaxed))
    }

    /// Snapshot of all band levels in table order.
    pub fn snapshot(&self) -> [f64; BAND_COUNT] {
        std::array::from_fn(|i| self.level(i))
    }

    fn store(&self, band: usize, level: f64) {
        self.levels[band].store(level.to_bits(), Ordering::Relaxed);
    }
}

/// Averages FFT magnitudes over the fixed band table.
pub struct BandEnergyProcessor {
    provider: Arc<dyn FftResultProvider>,
    /// Pre-allocated destination for the magnitude snapshot.
    scratch: Vec<f64>,
    /// Half-open bin ranges per band, precomputed from the provider.
    ranges: [(usize, usize); BAND_COUNT],
    levels: BandLevels,
}

impl BandEnergyProcessor {
    pub fn new(provider: Arc<dyn FftResultProvider>) -> Self {
        let fft_size = provider.fft_size();
        let sample_rate = provider.sample_rate();
        let max_bin = fft_size / 2;

        let bin_for = |hz: f64| -> usize {
            if hz.is_infinite() {
                return max_bin;
            }
            ((hz * fft_size as f64 / sample_rate).round() as usize).min(max_bin)
        };

        let ranges = std::array::from_fn(|i| {
            let band = &BANDS[i];
            // Skip the DC bin even for the lowest band.
            (bin_for(band.low_hz).max(1), bin_for(band.high_hz))
        });

        log::info!(
            "analysis: initializing band energy processor ({} bands, {:.1} Hz bin width)",
            BAND_COUNT,
            sample_rate / fft_size as f64
        );

        Self {
            scratch: vec![0.0; max_bin + 1],
            ranges,
            levels: BandLevels::new(),
            provider,
        }
    }

    /// Lock-free handle for control-thread reads.
    pub fn levels(&self) -> BandLevels {
        self.levels.clone()
    }
}

impl AudioProcessor for BandEnergyProcessor {
    fn name(&self) -> &'static str {
        "band-energy"
    }

    fn process(&mut self, _samples: &[i32]) {
        // Reads the snapshot the FFT processor published earlier in this
        // same callback; errors cannot occur with a correctly sized
        // scratch, but a failed read simply keeps the previous levels.
        if self.provider.magnitudes_into(&mut self.scratch).is_err() {
            return;
        }

        for (i, &(start, end)) in self.ranges.iter().enumerate() {
            let level = if start < end {
                let energy: f64 = self.scratch[start..end].iter().map(|m| m * m).sum();
                let mean_energy = energy / (end - start) as f64;
                (mean_energy.sqrt() * BAND_ENERGY_SCALE).min(1.0)
            } else {
                0.0
            };
            self.levels.store(i, level);
        }
    }

    fn close(&mut self) -> AudioResult<()> {
        log::debug!("analysis: closing band energy processor");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{FftProcessor, WindowKind};

    const FFT_SIZE: usize = 1024;
    const SAMPLE_RATE: f64 = 44100.0;

    fn sine_wave(freq: f64, amplitude: f64) -> Vec<i32> {
        (0..FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * freq * i as f64 / SAMPLE_RATE;
                (phase.sin() * amplitude * i32::MAX as f64) as i32
            })
            .collect()
    }

    fn band_index(name: &str) -> usize {
        BANDS.iter().position(|b| b.name == name).unwrap()
    }

    #[test]
    fn test_band_ranges_cover_spectrum_in_order() {
        let fft = FftProcessor::new(FFT_SIZE, SAMPLE_RATE, WindowKind::Hann).unwrap();
        let p = BandEnergyProcessor::new(Arc::new(fft.handle()));

        let mut prev_end = 0;
        for (i, &(start, end)) in p.ranges.iter().enumerate() {
            assert!(start >= 1, "band {} must skip the DC bin", i);
            assert!(start >= prev_end, "band {} overlaps its predecessor", i);
            assert!(end <= FFT_SIZE / 2);
            prev_end = end;
        }
        assert_eq!(
            p.ranges[BAND_COUNT - 1].1,
            FFT_SIZE / 2,
            "treble must reach Nyquist"
        );
    }

    #[test]
    fn test_sine_raises_its_own_band() {
        let mut fft = FftProcessor::new(FFT_SIZE, SAMPLE_RATE, WindowKind::Hann).unwrap();
        let mut bands = BandEnergyProcessor::new(Arc::new(fft.handle()));
        let levels = bands.levels();

        // 1 kHz falls inside "mid" (500-2000 Hz). Mic-level amplitude:
        // the ×50 display scaling saturates every band near the tone
        // for loud synthetic signals, which would mask the ordering.
        let signal = sine_wave(1000.0, 0.0003);
        fft.process(&signal);
        bands.process(&signal);

        let snapshot = levels.snapshot();
        let mid = band_index("mid");
        for (i, &level) in snapshot.iter().enumerate() {
            if i != mid {
                assert!(
                    snapshot[mid] > level,
                    "mid band ({}) should dominate band {} ({})",
                    snapshot[mid],
                    BANDS[i].name,
                    level
                );
            }
        }
    }

    #[test]
    fn test_levels_are_clamped_to_unit_range() {
        let mut fft = FftProcessor::new(FFT_SIZE, SAMPLE_RATE, WindowKind::Hann).unwrap();
        let mut bands = BandEnergyProcessor::new(Arc::new(fft.handle()));
        let levels = bands.levels();

        // Full-scale tone: the hosting band saturates at 1.0, nothing
        // may exceed it.
        let signal: Vec<i32> = (0..FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * 1000.0 * i as f64 / SAMPLE_RATE;
                (phase.sin() * i32::MAX as f64) as i32
            })
            .collect();
        fft.process(&signal);
        bands.process(&signal);

        let snapshot = levels.snapshot();
        for (i, &level) in snapshot.iter().enumerate() {
            assert!(
                (0.0..=1.0).contains(&level),
                "band {} level {} outside [0, 1]",
                BANDS[i].name,
                level
            );
        }
        assert_eq!(snapshot[band_index("mid")], 1.0, "full-scale tone saturates its band");
    }

    #[test]
    fn test_levels_update_between_frames() {
        let mut fft = FftProcessor::new(FFT_SIZE, SAMPLE_RATE, WindowKind::Hann).unwrap();
        let mut bands = BandEnergyProcessor::new(Arc::new(fft.handle()));
        let levels = bands.levels();

        let loud = sine_wave(100.0, 0.8);
        fft.process(&loud);
        bands.process(&loud);
        let bass_loud = levels.level(band_index("bass"));

        let silence = vec![0i32; FFT_SIZE];
        fft.process(&silence);
        bands.process(&silence);
        let bass_silent = levels.level(band_index("bass"));

        assert!(bass_loud > 0.0);
        assert!(
            bass_silent < bass_loud / 100.0,
            "silence should collapse the bass level ({} vs {})",
            bass_silent,
            bass_loud
        );
    }
}
