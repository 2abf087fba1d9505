//! Impulse response loading
//!
//! decode → channel fit → truncate → resample → normalise.

use std::path::Path;

use pf_core::ImpulseResponse;
use serde::{Deserialize, Serialize};

use crate::error::{FileError, FileResult};
use crate::resample::resample_impulse_response;
use crate::wav::{WavData, read_wav, read_wav_from};

/// Headroom target for loaded IRs
pub const DEFAULT_IR_PEAK: f64 = 0.5;

/// Longest IR kept after decoding
pub const DEFAULT_MAX_IR_SECS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrLoadOptions {
    /// Engine sample rate the IR is converted to
    pub target_rate: f64,
    /// Peak after normalisation; `None` keeps the file's gain
    pub normalize_peak: Option<f64>,
    /// Longer files are truncated (measured at the file's own rate)
    pub max_length_secs: f64,
}

impl IrLoadOptions {
    pub fn new(target_rate: f64) -> Self {
        Self {
            target_rate,
            ..Self::default()
        }
    }
}

impl Default for IrLoadOptions {
    fn default() -> Self {
        Self {
            target_rate: 48000.0,
            normalize_peak: Some(DEFAULT_IR_PEAK),
            max_length_secs: DEFAULT_MAX_IR_SECS,
        }
    }
}

/// Load an IR file ready for partitioning
pub fn load_impulse_response<P: AsRef<Path>>(
    path: P,
    options: &IrLoadOptions,
) -> FileResult<ImpulseResponse> {
    let path = path.as_ref();
    let wav = read_wav(path).inspect_err(|e| {
        log::warn!("Failed to load IR {}: {e}", path.display());
    })?;
    let ir = prepare(wav, options)?;
    log::info!(
        "Loaded IR {} ({} ch, {} frames @ {} Hz)",
        path.display(),
        ir.num_channels(),
        ir.len(),
        ir.sample_rate()
    );
    Ok(ir)
}

/// Same as [`load_impulse_response`] for in-memory WAV bytes
pub fn load_impulse_response_bytes(
    bytes: &[u8],
    options: &IrLoadOptions,
) -> FileResult<ImpulseResponse> {
    let wav = read_wav_from(std::io::Cursor::new(bytes))?;
    prepare(wav, options)
}

fn prepare(wav: WavData, options: &IrLoadOptions) -> FileResult<ImpulseResponse> {
    let source_rate = wav.sample_rate as f64;
    let mut channels = wav.channels;

    if channels.iter().all(Vec::is_empty) {
        return Err(FileError::InvalidFile("IR has no frames".into()));
    }

    if channels.len() > 2 {
        log::warn!("IR has {} channels, keeping the first two", channels.len());
        channels.truncate(2);
    }

    let max_frames = (options.max_length_secs.max(0.0) * source_rate) as usize;
    if max_frames > 0 {
        for ch in &mut channels {
            ch.truncate(max_frames);
        }
    }

    // Non-finite samples are scrubbed to zero by the constructor
    let mut ir = ImpulseResponse::new(channels, source_rate);
    if ir.is_silent() {
        return Err(FileError::InvalidFile("IR is silent".into()));
    }
    if options.target_rate > 0.0 && options.target_rate != source_rate {
        log::warn!(
            "IR sample rate {source_rate} Hz differs from engine rate {} Hz",
            options.target_rate
        );
        ir = resample_impulse_response(ir, options.target_rate)?;
    }

    if ir.is_silent() {
        return Err(FileError::InvalidFile("IR is silent after resampling".into()));
    }

    Ok(match options.normalize_peak {
        Some(peak) => ir.normalized_to_peak(peak),
        None => ir,
    })
}
