//! Envelope detector for dynamics and envelope-driven modulation
//!
//! One-pole smoothing with separate attack and release time constants:
//! `coeff = exp(-1 / (τ_ms · 0.001 · fs))`, `env = x + coeff·(env − x)`.
//! A unit step therefore reaches `1 − 1/e` after exactly τ.

use pf_core::{Sample, gain_to_db};
use serde::{Deserialize, Serialize};

use crate::param_gate::ParameterGate;

pub const DEFAULT_RMS_WINDOW_MS: f64 = 50.0;

/// What the detector measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetectorMode {
    /// `|x|`
    #[default]
    Peak,
    /// Square root of a running mean-square
    Rms,
}

/// How rising input is followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnvelopePolicy {
    /// Jump to any higher input; release smoothed (gates, limiters)
    InstantAttack,
    /// Attack and release both smoothed (compressors, auto-wah)
    #[default]
    Smoothed,
}

/// One-pole coefficient for a time constant in ms. Zero or negative time
/// gives 0 (no smoothing).
#[inline]
pub fn time_constant_coeff(time_ms: f64, sample_rate: f64) -> f64 {
    let samples = time_ms * 0.001 * sample_rate;
    if samples.is_finite() && samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Peak/RMS envelope detector
#[derive(Debug, Clone)]
pub struct EnvelopeDetector {
    mode: DetectorMode,
    policy: EnvelopePolicy,
    level: f64,
    mean_square: f64,
    attack_ms: f64,
    release_ms: f64,
    rms_window_ms: f64,
    attack_coeff: f64,
    release_coeff: f64,
    rms_coeff: f64,
    sample_rate: f64,
    gate: ParameterGate<(u64, u64, u64, u64)>,
}

impl EnvelopeDetector {
    pub fn new(sample_rate: f64) -> Self {
        let mut detector = Self {
            mode: DetectorMode::Peak,
            policy: EnvelopePolicy::Smoothed,
            level: 0.0,
            mean_square: 0.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            rms_window_ms: DEFAULT_RMS_WINDOW_MS,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            rms_coeff: 0.0,
            sample_rate,
            gate: ParameterGate::new(),
        };
        detector.update_coeffs();
        detector
    }

    pub fn with_config(
        sample_rate: f64,
        mode: DetectorMode,
        policy: EnvelopePolicy,
        attack_ms: f64,
        release_ms: f64,
    ) -> Self {
        let mut detector = Self::new(sample_rate);
        detector.mode = mode;
        detector.policy = policy;
        detector.set_times(attack_ms, release_ms);
        detector
    }

    /// Recompute coefficients only if a time constant or the rate changed.
    fn update_coeffs(&mut self) {
        let key = (
            self.attack_ms.to_bits(),
            self.release_ms.to_bits(),
            self.rms_window_ms.to_bits(),
            self.sample_rate.to_bits(),
        );
        if self.gate.changed(key) {
            self.attack_coeff = time_constant_coeff(self.attack_ms, self.sample_rate);
            self.release_coeff = time_constant_coeff(self.release_ms, self.sample_rate);
            self.rms_coeff = time_constant_coeff(self.rms_window_ms, self.sample_rate);
        }
    }

    /// Attack and release in milliseconds (negative clamps to 0)
    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.attack_ms = if attack_ms.is_finite() { attack_ms.max(0.0) } else { 0.0 };
        self.release_ms = if release_ms.is_finite() { release_ms.max(0.0) } else { 0.0 };
        self.update_coeffs();
    }

    pub fn set_rms_window(&mut self, window_ms: f64) {
        self.rms_window_ms = if window_ms.is_finite() { window_ms.max(0.0) } else { DEFAULT_RMS_WINDOW_MS };
        self.update_coeffs();
    }

    pub fn set_mode(&mut self, mode: DetectorMode) {
        self.mode = mode;
    }

    pub fn set_policy(&mut self, policy: EnvelopePolicy) {
        self.policy = policy;
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.update_coeffs();
    }

    #[inline]
    pub fn attack_coeff(&self) -> f64 {
        self.attack_coeff
    }

    #[inline]
    pub fn release_coeff(&self) -> f64 {
        self.release_coeff
    }

    /// Feed one sample, return the new level (linear, ≥ 0).
    #[inline]
    pub fn process(&mut self, input: Sample) -> f64 {
        let input = if input.is_finite() { input } else { 0.0 };

        let detected = match self.mode {
            DetectorMode::Peak => input.abs(),
            DetectorMode::Rms => {
                let sq = input * input;
                self.mean_square = sq + self.rms_coeff * (self.mean_square - sq);
                self.mean_square.max(0.0).sqrt()
            }
        };

        if detected > self.level {
            self.level = match self.policy {
                EnvelopePolicy::InstantAttack => detected,
                EnvelopePolicy::Smoothed => {
                    detected + self.attack_coeff * (self.level - detected)
                }
            };
        } else {
            self.level = detected + self.release_coeff * (self.level - detected);
        }
        self.level = crate::flush_denormal(self.level);
        self.level
    }

    /// Linked stereo detection: feeds `max(|l|, |r|)`.
    #[inline]
    pub fn process_stereo(&mut self, left: Sample, right: Sample) -> f64 {
        let l = if left.is_finite() { left.abs() } else { 0.0 };
        let r = if right.is_finite() { right.abs() } else { 0.0 };
        self.process(l.max(r))
    }

    #[inline]
    pub fn level(&self) -> f64 {
        self.level
    }

    /// `20·log10(max(level, 1e-5))`
    #[inline]
    pub fn level_db(&self) -> f64 {
        gain_to_db(self.level)
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
        self.mean_square = 0.0;
    }
}
