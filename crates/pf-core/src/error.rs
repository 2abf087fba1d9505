//! Error types for PedalForge
//!
//! Only control-side operations (loading, parsing, configuration) are
//! fallible. The audio path never returns errors: it clamps or degrades.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum PfError {
    #[error("DSP error: {0}")]
    Dsp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type PfResult<T> = Result<T, PfError>;
