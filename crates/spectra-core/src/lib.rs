//! Spectra core — real-time audio spectrum analysis
//!
//! Captures interleaved i32 samples from a host input device, runs a
//! fixed analysis chain per buffer (noise gate, windowed real-to-complex
//! FFT, band energies), and periodically publishes the magnitude
//! spectrum over a connected datagram socket for downstream
//! visualization.
//!
//! The audio callback is the hot path: no allocation, no blocking I/O,
//! no logging, and no lock held against it for longer than a short
//! memcpy. See the `audio::engine` and `dsp::fft` module docs for the
//! concurrency discipline.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod dsp;
pub mod net;
