//! Biquad filter implementation using Transposed Direct Form II
//!
//! TDF-II keeps only two state words per channel and has the best
//! round-off behaviour of the direct forms in floating point. Coefficients
//! live apart from state so one design can drive several channels.

use pf_core::Sample;

use crate::filter_design::{BiquadCoeffs, FilterSpec};
use crate::param_gate::ParameterGate;
use crate::{MonoProcessor, Processor, ProcessorConfig, StereoProcessor, flush_denormal};

/// Per-channel TDF-II state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    z1: f64,
    z2: f64,
}

impl BiquadState {
    /// `y = b0·x + z1; z1 = b1·x − a1·y + z2; z2 = b2·x − a2·y`
    #[inline(always)]
    pub fn tick(&mut self, c: &BiquadCoeffs, input: Sample) -> Sample {
        let output = c.b0 * input + self.z1;
        self.z1 = flush_denormal(c.b1 * input - c.a1 * output + self.z2);
        self.z2 = flush_denormal(c.b2 * input - c.a2 * output);
        output
    }

    #[inline]
    pub fn clear(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// Transposed Direct Form II biquad filter
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    state: BiquadState,
    sample_rate: f64,
}

impl BiquadTDF2 {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_coeffs(BiquadCoeffs::bypass(), sample_rate)
    }

    pub fn with_coeffs(coeffs: BiquadCoeffs, sample_rate: f64) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
            sample_rate,
        }
    }

    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Design unconditionally from a spec
    pub fn set_spec(&mut self, spec: &FilterSpec) {
        self.coeffs = BiquadCoeffs::design(spec, self.sample_rate);
    }

    pub fn set_lowpass(&mut self, freq: f64, q: f64) {
        self.set_spec(&FilterSpec::lowpass(freq, q));
    }

    pub fn set_highpass(&mut self, freq: f64, q: f64) {
        self.set_spec(&FilterSpec::highpass(freq, q));
    }

    pub fn set_bypass(&mut self) {
        self.coeffs = BiquadCoeffs::bypass();
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.state.clear();
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        self.state.tick(&self.coeffs, input)
    }
}

impl ProcessorConfig for BiquadTDF2 {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }
}

/// Stereo biquad: one coefficient set, two channel states.
///
/// `set_spec` is change-gated, so calling it every block with unchanged
/// inputs costs one comparison.
#[derive(Debug, Clone)]
pub struct StereoBiquad {
    coeffs: BiquadCoeffs,
    left: BiquadState,
    right: BiquadState,
    sample_rate: f64,
    gate: ParameterGate<(FilterSpec, u64)>,
}

impl StereoBiquad {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            coeffs: BiquadCoeffs::bypass(),
            left: BiquadState::default(),
            right: BiquadState::default(),
            sample_rate,
            gate: ParameterGate::new(),
        }
    }

    pub fn with_spec(spec: FilterSpec, sample_rate: f64) -> Self {
        let mut filter = Self::new(sample_rate);
        filter.set_spec(&spec);
        filter
    }

    /// Redesign if `spec` (or the sample rate) changed since the last call.
    /// Returns whether coefficients were recomputed.
    #[inline]
    pub fn set_spec(&mut self, spec: &FilterSpec) -> bool {
        if self.gate.changed((*spec, self.sample_rate.to_bits())) {
            self.coeffs = BiquadCoeffs::design(spec, self.sample_rate);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Coefficient recomputations so far
    pub fn recomputations(&self) -> u64 {
        self.gate.recomputations()
    }

    /// Run only the left state (mono use)
    #[inline(always)]
    pub fn process_left(&mut self, input: Sample) -> Sample {
        self.left.tick(&self.coeffs, input)
    }

    #[inline(always)]
    pub fn process_right(&mut self, input: Sample) -> Sample {
        self.right.tick(&self.coeffs, input)
    }
}

impl Processor for StereoBiquad {
    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

impl StereoProcessor for StereoBiquad {
    #[inline(always)]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        (
            self.left.tick(&self.coeffs, left),
            self.right.tick(&self.coeffs, right),
        )
    }
}

impl ProcessorConfig for StereoBiquad {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        // Last spec is redesigned at the new rate on the next set_spec.
        if let Some(&(spec, _)) = self.gate.last() {
            self.set_spec(&spec);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_design::FilterType;

    #[test]
    fn test_bypass() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_bypass();

        for i in 0..100 {
            let input = (i as f64 * 0.1).sin();
            let output = MonoProcessor::process_sample(&mut filter, input);
            assert!((input - output).abs() < 1e-10);
        }
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_lowpass(1000.0, 0.707);

        let mut output = 0.0;
        for _ in 0..10000 {
            output = MonoProcessor::process_sample(&mut filter, 1.0);
        }
        assert!((output - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_highpass(1000.0, 0.707);

        let mut output = 1.0;
        for _ in 0..10000 {
            output = MonoProcessor::process_sample(&mut filter, 1.0);
        }
        assert!(output.abs() < 0.01);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_lowpass(1000.0, 0.707);

        for _ in 0..100 {
            MonoProcessor::process_sample(&mut filter, 1.0);
        }
        filter.reset();

        let output = MonoProcessor::process_sample(&mut filter, 0.0);
        assert_eq!(output, 0.0);
    }

    #[test]
    fn test_stereo_gate_skips_redesign() {
        let mut filter = StereoBiquad::new(48000.0);
        let spec = FilterSpec::new(FilterType::Peak, 800.0, 1.2, 3.0);

        assert!(filter.set_spec(&spec));
        for _ in 0..50 {
            assert!(!filter.set_spec(&spec));
        }
        assert_eq!(filter.recomputations(), 1);

        filter.set_sample_rate(96000.0);
        assert_eq!(filter.recomputations(), 2);
    }

    #[test]
    fn test_stereo_channels_independent() {
        let mut filter = StereoBiquad::with_spec(FilterSpec::lowpass(500.0, 0.707), 48000.0);
        let (l, r) = StereoProcessor::process_sample(&mut filter, 1.0, 0.0);
        assert!(l > 0.0);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn test_denormal_state_flushed() {
        let mut filter = BiquadTDF2::new(48000.0);
        filter.set_lowpass(100.0, 0.707);
        MonoProcessor::process_sample(&mut filter, 1e-300);
        for _ in 0..10 {
            MonoProcessor::process_sample(&mut filter, 0.0);
        }
        assert_eq!(filter.state, BiquadState::default());
    }
}
