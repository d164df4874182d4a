//! DSP building blocks: power-of-two sizing, window functions, and the
//! real-to-complex FFT processor with its shared magnitude snapshot.

mod error;
mod fft;
mod pow2;
mod window;

pub use error::{DspError, DspResult};
pub use fft::{FftProcessor, SpectrumHandle};
pub use pow2::{is_power_of_two, next_power_of_two};
pub use window::WindowKind;
