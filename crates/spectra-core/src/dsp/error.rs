//! DSP error types

use thiserror::Error;

/// Errors that can occur in the DSP layer
#[derive(Error, Debug)]
pub enum DspError {
    /// FFT size must be a positive power of two
    #[error("FFT size must be a positive power of two, got {0}")]
    InvalidFftSize(usize),

    /// Sample rate must be positive
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f64),

    /// Destination slice has the wrong length for a magnitude copy
    #[error("destination length {got} does not match magnitude count {expected}")]
    LengthMismatch { expected: usize, got: usize },

    /// Unknown window function name (caller should fall back to Hann)
    #[error("unknown FFT window function name: '{0}'")]
    UnknownWindow(String),
}

/// Result type for DSP operations
pub type DspResult<T> = Result<T, DspError>;
