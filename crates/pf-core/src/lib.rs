//! pf-core: Shared types for PedalForge
//!
//! Sample types, process configuration, decibel helpers, the flat parameter
//! model and the immutable impulse-response resource used across all crates.

mod error;
mod impulse;
mod params;
mod sample;

pub use error::*;
pub use impulse::*;
pub use params::*;
pub use sample::*;

use serde::{Deserialize, Serialize};

/// Lowest sample rate accepted by `ProcessSpec`
pub const MIN_SAMPLE_RATE: f64 = 8000.0;
/// Highest sample rate accepted by `ProcessSpec`
pub const MAX_SAMPLE_RATE: f64 = 384_000.0;
/// Largest host block an effect is ever prepared for
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Floor applied before converting a linear level to decibels (-100 dB)
pub const LEVEL_FLOOR: f64 = 1e-5;

/// Standard sample rate options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum SampleRate {
    Hz44100 = 44100,
    Hz48000 = 48000,
    Hz88200 = 88200,
    Hz96000 = 96000,
    Hz192000 = 192000,
}

impl SampleRate {
    #[inline]
    pub fn as_f64(self) -> f64 {
        self as u32 as f64
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::Hz48000
    }
}

/// Buffer size options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum BufferSize {
    Samples32 = 32,
    Samples64 = 64,
    Samples128 = 128,
    Samples256 = 256,
    Samples512 = 512,
    Samples1024 = 1024,
}

impl BufferSize {
    #[inline]
    pub fn as_usize(self) -> usize {
        self as u32 as usize
    }

    /// Calculate latency in milliseconds
    #[inline]
    pub fn latency_ms(self, sample_rate: SampleRate) -> f64 {
        (self.as_usize() as f64 / sample_rate.as_f64()) * 1000.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self::Samples256
    }
}

/// Everything an effect needs to size its state: handed to `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub sample_rate: f64,
    pub max_block_size: usize,
}

impl ProcessSpec {
    /// Build a spec, clamping both fields into the supported range.
    pub fn new(sample_rate: f64, max_block_size: usize) -> Self {
        let clamped_rate = if sample_rate.is_finite() {
            sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE)
        } else {
            SampleRate::default().as_f64()
        };
        if clamped_rate != sample_rate {
            log::warn!(
                "sample rate {} out of range, using {}",
                sample_rate,
                clamped_rate
            );
        }

        Self {
            sample_rate: clamped_rate,
            max_block_size: max_block_size.clamp(1, MAX_BLOCK_SIZE),
        }
    }

    pub fn from_config(sample_rate: SampleRate, buffer_size: BufferSize) -> Self {
        Self::new(sample_rate.as_f64(), buffer_size.as_usize())
    }

    /// Converts milliseconds to a (fractional) sample count at this rate.
    #[inline]
    pub fn ms_to_samples(&self, ms: f64) -> f64 {
        ms * 0.001 * self.sample_rate
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self::from_config(SampleRate::default(), BufferSize::default())
    }
}

/// Decibel value wrapper
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const ZERO: Self = Self(0.0);

    /// Linear level to dB with the -100 dB floor.
    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        Self(gain_to_db(gain))
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        db_to_gain(self.0)
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}

/// `20·log10(max(level, 1e-5))`. Never returns -inf or NaN.
#[inline]
pub fn gain_to_db(level: f64) -> f64 {
    let level = if level.is_nan() { 0.0 } else { level.abs() };
    20.0 * level.max(LEVEL_FLOOR).log10()
}

#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gain_to_db_floor() {
        assert_relative_eq!(gain_to_db(0.0), -100.0);
        assert_relative_eq!(gain_to_db(f64::NAN), -100.0);
        assert_relative_eq!(gain_to_db(1.0), 0.0);
        assert_relative_eq!(gain_to_db(0.5), -6.0206, epsilon = 1e-4);
    }

    #[test]
    fn test_db_roundtrip() {
        let db = Decibels::from_gain(0.25);
        assert_relative_eq!(db.to_gain(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_process_spec_clamps() {
        let spec = ProcessSpec::new(1.0e9, 0);
        assert_eq!(spec.sample_rate, MAX_SAMPLE_RATE);
        assert_eq!(spec.max_block_size, 1);

        let spec = ProcessSpec::new(f64::NAN, 100_000);
        assert_eq!(spec.sample_rate, 48000.0);
        assert_eq!(spec.max_block_size, MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_process_spec_serde() {
        let spec = ProcessSpec::from_config(SampleRate::Hz44100, BufferSize::Samples128);
        let json = serde_json::to_string(&spec).unwrap();
        let back: ProcessSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
        assert_relative_eq!(spec.ms_to_samples(10.0), 441.0);
    }
}
