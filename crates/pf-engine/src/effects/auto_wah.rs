//! Envelope-controlled band-pass (auto-wah)
//!
//! A linked stereo envelope follower drives the band-pass centre on an
//! exponential sweep between `min_freq` and `max_freq`. The filter is
//! redesigned at control rate; the parameter gate inside `StereoBiquad`
//! skips redesigns while the envelope is flat.

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample};
use pf_dsp::{
    DetectorMode, EnvelopeDetector, EnvelopePolicy, FilterSpec, Processor, ProcessorConfig,
    StereoBiquad, StereoProcessor,
};
use serde::{Deserialize, Serialize};

use super::{CONTROL_INTERVAL, EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_SENSITIVITY: ParamId = ParamId(0);
pub const PARAM_MIN_FREQ: ParamId = ParamId(1);
pub const PARAM_MAX_FREQ: ParamId = ParamId(2);
pub const PARAM_Q: ParamId = ParamId(3);
pub const PARAM_ATTACK: ParamId = ParamId(4);
pub const PARAM_RELEASE: ParamId = ParamId(5);
pub const PARAM_MIX: ParamId = ParamId(6);

static PARAMS: [ParamSpec; 7] = [
    ParamSpec::new(0, "sensitivity", "", ParamRange::linear(0.0, 1.0, 0.6)),
    ParamSpec::new(1, "min_freq", "Hz", ParamRange::logarithmic(100.0, 2000.0, 300.0)),
    ParamSpec::new(2, "max_freq", "Hz", ParamRange::logarithmic(500.0, 5000.0, 2500.0)),
    ParamSpec::new(3, "q", "", ParamRange::logarithmic(0.5, 15.0, 4.0)),
    ParamSpec::new(4, "attack", "ms", ParamRange::logarithmic(1.0, 200.0, 10.0)),
    ParamSpec::new(5, "release", "ms", ParamRange::logarithmic(10.0, 1000.0, 120.0)),
    ParamSpec::new(6, "mix", "", ParamRange::linear(0.0, 1.0, 1.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Auto Wah",
    kind: EffectKind::AutoWah,
    params: &PARAMS,
    capabilities: Capabilities::STEREO_LINKED,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoWahConfig {
    pub sensitivity: f64,
    pub min_freq: f64,
    pub max_freq: f64,
    pub q: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    pub mix: f64,
}

impl AutoWahConfig {
    pub fn set_sensitivity(&mut self, value: f64) {
        self.sensitivity = clamp_or(value, 0.0, 1.0, 0.6);
    }

    pub fn set_min_freq(&mut self, hz: f64) {
        self.min_freq = clamp_or(hz, 100.0, 2000.0, 300.0);
    }

    pub fn set_max_freq(&mut self, hz: f64) {
        self.max_freq = clamp_or(hz, 500.0, 5000.0, 2500.0);
    }

    pub fn set_q(&mut self, q: f64) {
        self.q = clamp_or(q, 0.5, 15.0, 4.0);
    }

    pub fn set_attack_ms(&mut self, ms: f64) {
        self.attack_ms = clamp_or(ms, 1.0, 200.0, 10.0);
    }

    pub fn set_release_ms(&mut self, ms: f64) {
        self.release_ms = clamp_or(ms, 10.0, 1000.0, 120.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 1.0);
    }

    /// Centre frequency for an envelope level (linear)
    pub fn sweep(&self, level: f64) -> f64 {
        let gain = 1.0 + 9.0 * self.sensitivity;
        let position = (level * gain).clamp(0.0, 1.0);
        // Either bound may be the larger one; the sweep just runs backwards
        self.min_freq * (self.max_freq / self.min_freq).powf(position)
    }
}

impl Default for AutoWahConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.6,
            min_freq: 300.0,
            max_freq: 2500.0,
            q: 4.0,
            attack_ms: 10.0,
            release_ms: 120.0,
            mix: 1.0,
        }
    }
}

pub struct AutoWah {
    config: AutoWahConfig,
    detector: EnvelopeDetector,
    filter: StereoBiquad,
    countdown: usize,
}

impl AutoWah {
    pub fn new() -> Self {
        let config = AutoWahConfig::default();
        let sample_rate = ProcessSpec::default().sample_rate;
        Self {
            config,
            detector: EnvelopeDetector::with_config(
                sample_rate,
                DetectorMode::Peak,
                EnvelopePolicy::Smoothed,
                config.attack_ms,
                config.release_ms,
            ),
            filter: StereoBiquad::new(sample_rate),
            countdown: 0,
        }
    }

    pub fn config(&self) -> &AutoWahConfig {
        &self.config
    }

    /// Current band-pass centre
    pub fn center_frequency(&self) -> f64 {
        self.config.sweep(self.detector.level())
    }

    fn update_filter(&mut self) {
        let spec = FilterSpec::bandpass(self.center_frequency(), self.config.q);
        self.filter.set_spec(&spec);
    }
}

impl Default for AutoWah {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for AutoWah {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.detector.set_sample_rate(spec.sample_rate);
        self.filter.set_sample_rate(spec.sample_rate);
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_SENSITIVITY => self.config.set_sensitivity(value),
            PARAM_MIN_FREQ => self.config.set_min_freq(value),
            PARAM_MAX_FREQ => self.config.set_max_freq(value),
            PARAM_Q => self.config.set_q(value),
            PARAM_ATTACK => self.config.set_attack_ms(value),
            PARAM_RELEASE => self.config.set_release_ms(value),
            PARAM_MIX => self.config.set_mix(value),
            _ => return,
        }
        self.detector
            .set_times(self.config.attack_ms, self.config.release_ms);
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let mix = self.config.mix;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.detector.process_stereo(*l, *r);
            if self.countdown == 0 {
                self.update_filter();
                self.countdown = CONTROL_INTERVAL;
            }
            self.countdown -= 1;

            let (wet_l, wet_r) = self.filter.process_sample(*l, *r);
            *l = blend(*l, wet_l, mix);
            *r = blend(*r, wet_r, mix);
        }
    }

    fn reset(&mut self) {
        self.detector.reset();
        self.filter.reset();
        self.countdown = 0;
        self.update_filter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_spans_range() {
        let config = AutoWahConfig::default();
        assert!((config.sweep(0.0) - 300.0).abs() < 1e-9);
        assert!((config.sweep(1.0) - 2500.0).abs() < 1e-9);
        let mid = config.sweep(0.05);
        assert!(mid > 300.0 && mid < 2500.0);
    }

    #[test]
    fn test_centre_rises_with_level() {
        let mut wah = AutoWah::new();
        wah.prepare(&ProcessSpec::new(48000.0, 512));
        let idle = wah.center_frequency();

        let mut l = vec![0.8; 512];
        let mut r = vec![0.8; 512];
        for _ in 0..10 {
            wah.process_stereo(&mut l, &mut r);
            l.fill(0.8);
            r.fill(0.8);
        }
        assert!(wah.center_frequency() > 2.0 * idle);
    }

    #[test]
    fn test_linked_detection_follows_louder_side() {
        let mut wah = AutoWah::new();
        wah.prepare(&ProcessSpec::new(48000.0, 512));
        let mut l = vec![0.0; 512];
        let mut r = vec![0.9; 512];
        wah.process_stereo(&mut l, &mut r);
        assert!(wah.center_frequency() > 300.0);
    }
}
