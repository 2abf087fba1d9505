//! pf-dsp: DSP primitives for PedalForge
//!
//! Allocation-free building blocks shared by every effect.
//!
//! ## Modules
//! - `filter_design` - RBJ cookbook coefficient design (8 filter types)
//! - `biquad` - TDF-II biquad with change-gated coefficient updates
//! - `delay_line` - circular fractional delay (linear / cubic Hermite reads)
//! - `lfo` - low-frequency oscillator (sine, triangle, square, saw, S&H)
//! - `envelope` - peak/RMS envelope detector with attack/release policies
//! - `param_gate` - skip recomputation when design inputs are unchanged
//! - `smoothing` - click-free parameter ramps
//! - `saturation` - soft clipping and waveshaping
//! - `comb` - damped comb and Schroeder all-pass for reverbs
//! - `convolution` - uniform partitioned FFT block convolver
//! - `neural` - single-layer LSTM amp model inference
//! - `analysis` - RMS/peak and FFT distortion measurement

pub mod analysis;
pub mod biquad;
pub mod comb;
pub mod convolution;
pub mod delay_line;
pub mod envelope;
pub mod filter_design;
pub mod lfo;
pub mod neural;
pub mod param_gate;
pub mod saturation;
pub mod smoothing;

pub use biquad::*;
pub use delay_line::*;
pub use envelope::*;
pub use filter_design::*;
pub use lfo::*;
pub use param_gate::*;
pub use smoothing::*;

use pf_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// Stereo processor trait
pub trait StereoProcessor: Processor {
    /// Process a stereo sample pair
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample);

    /// Process stereo blocks
    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process_sample(*l, *r);
        }
    }
}

/// Processor configuration for sample rate changes
pub trait ProcessorConfig {
    fn set_sample_rate(&mut self, sample_rate: f64);
}

/// Ceiling for any user-facing feedback amount
pub const MAX_FEEDBACK: f64 = 0.95;

/// Below this magnitude recursive state is snapped to zero.
pub const DENORMAL_THRESHOLD: f64 = 1e-30;

/// Snap subnormal-range values to zero so recursive filters never stall
/// on denormal arithmetic during silence.
#[inline(always)]
pub fn flush_denormal(x: f64) -> f64 {
    if x.abs() < DENORMAL_THRESHOLD { 0.0 } else { x }
}
