//! pf-file: impulse response and model loading
//!
//! Everything here runs on control threads:
//! - WAV decoding (hound) for 8/16/24/32-bit PCM and 32-bit float
//! - Sample-rate conversion (rubato)
//! - Peak normalisation and truncation of IRs
//! - A content-addressed IR library sharing `Arc<ImpulseResponse>`
//! - LSTM model files (serde_json)

mod error;
pub mod ir_library;
pub mod ir_loader;
pub mod model;
pub mod resample;
pub mod wav;

pub use error::*;
pub use ir_library::{IrLibrary, LibraryStats};
pub use ir_loader::{IrLoadOptions, load_impulse_response, load_impulse_response_bytes};
pub use model::{load_lstm_model, parse_lstm_model};
pub use resample::{resample_channels, resample_impulse_response};
pub use wav::{BitDepth, WavData, read_wav, read_wav_from};
