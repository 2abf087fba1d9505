//! Feed-forward compressor with soft knee and short lookahead
//!
//! Detection runs on the incoming signal while gain is applied to a copy
//! delayed by the lookahead, so transients are caught before they pass.
//! The lookahead is fixed, which keeps the reported latency constant.

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample, db_to_gain, gain_to_db};
use pf_dsp::{DelayLine, DetectorMode, EnvelopeDetector, EnvelopePolicy};
use serde::{Deserialize, Serialize};

use super::{EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_THRESHOLD: ParamId = ParamId(0);
pub const PARAM_RATIO: ParamId = ParamId(1);
pub const PARAM_ATTACK: ParamId = ParamId(2);
pub const PARAM_RELEASE: ParamId = ParamId(3);
pub const PARAM_KNEE: ParamId = ParamId(4);
pub const PARAM_MAKEUP: ParamId = ParamId(5);
pub const PARAM_DETECTOR: ParamId = ParamId(6);
pub const PARAM_LINK: ParamId = ParamId(7);
pub const PARAM_MIX: ParamId = ParamId(8);

/// Fixed lookahead
pub const LOOKAHEAD_MS: f64 = 1.5;

static PARAMS: [ParamSpec; 9] = [
    ParamSpec::new(0, "threshold", "dB", ParamRange::linear(-60.0, 0.0, -18.0)),
    ParamSpec::new(1, "ratio", ":1", ParamRange::logarithmic(1.0, 20.0, 4.0)),
    ParamSpec::new(2, "attack", "ms", ParamRange::logarithmic(0.1, 100.0, 10.0)),
    ParamSpec::new(3, "release", "ms", ParamRange::logarithmic(10.0, 1000.0, 100.0)),
    ParamSpec::new(4, "knee", "dB", ParamRange::linear(0.0, 24.0, 6.0)),
    ParamSpec::new(5, "makeup", "dB", ParamRange::linear(0.0, 24.0, 0.0)),
    ParamSpec::new(6, "detector", "", ParamRange::stepped(0.0, 1.0, 0.0)),
    ParamSpec::new(7, "link", "", ParamRange::toggle(true)),
    ParamSpec::new(8, "mix", "", ParamRange::linear(0.0, 1.0, 1.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Compressor",
    kind: EffectKind::Compressor,
    params: &PARAMS,
    capabilities: Capabilities {
        needs_stereo_link: true,
        reports_latency: true,
        has_lookahead: true,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorConfig {
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    pub knee_db: f64,
    pub makeup_db: f64,
    pub detector: DetectorMode,
    pub link: bool,
    pub mix: f64,
}

impl CompressorConfig {
    pub fn set_threshold_db(&mut self, db: f64) {
        self.threshold_db = clamp_or(db, -60.0, 0.0, -18.0);
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = clamp_or(ratio, 1.0, 20.0, 4.0);
    }

    pub fn set_attack_ms(&mut self, ms: f64) {
        self.attack_ms = clamp_or(ms, 0.1, 100.0, 10.0);
    }

    pub fn set_release_ms(&mut self, ms: f64) {
        self.release_ms = clamp_or(ms, 10.0, 1000.0, 100.0);
    }

    pub fn set_knee_db(&mut self, db: f64) {
        self.knee_db = clamp_or(db, 0.0, 24.0, 6.0);
    }

    pub fn set_makeup_db(&mut self, db: f64) {
        self.makeup_db = clamp_or(db, 0.0, 24.0, 0.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 1.0);
    }

    /// Static curve: gain reduction in dB (≥ 0) for a detector level in dB
    pub fn gain_reduction_db(&self, input_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let half_knee = self.knee_db / 2.0;
        let knee_start = self.threshold_db - half_knee;
        let knee_end = self.threshold_db + half_knee;

        if input_db <= knee_start {
            0.0
        } else if input_db >= knee_end || self.knee_db <= 0.0 {
            (input_db - self.threshold_db) * slope
        } else {
            let x = input_db - knee_start;
            slope * x * x / (2.0 * self.knee_db)
        }
    }
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            knee_db: 6.0,
            makeup_db: 0.0,
            detector: DetectorMode::Peak,
            link: true,
            mix: 1.0,
        }
    }
}

pub struct Compressor {
    config: CompressorConfig,
    detectors: [EnvelopeDetector; 2],
    lookahead: [DelayLine; 2],
    lookahead_samples: usize,
    gain_reduction_db: [f64; 2],
}

impl Compressor {
    pub fn new() -> Self {
        let sample_rate = ProcessSpec::default().sample_rate;
        let config = CompressorConfig::default();
        let detector = || {
            EnvelopeDetector::with_config(
                sample_rate,
                config.detector,
                EnvelopePolicy::Smoothed,
                config.attack_ms,
                config.release_ms,
            )
        };
        Self {
            config,
            detectors: [detector(), detector()],
            lookahead: [DelayLine::with_max_delay(0), DelayLine::with_max_delay(0)],
            lookahead_samples: 0,
            gain_reduction_db: [0.0; 2],
        }
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Latest gain reduction per channel (dB, ≥ 0)
    pub fn gain_reduction_db(&self) -> [f64; 2] {
        self.gain_reduction_db
    }

    fn sync_detectors(&mut self) {
        for detector in &mut self.detectors {
            detector.set_times(self.config.attack_ms, self.config.release_ms);
            detector.set_mode(self.config.detector);
        }
    }

    #[inline]
    fn gain_for(&mut self, channel: usize, level: f64) -> f64 {
        let reduction = self.config.gain_reduction_db(gain_to_db(level));
        self.gain_reduction_db[channel] = reduction;
        db_to_gain(self.config.makeup_db - reduction)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Compressor {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lookahead_samples = spec.ms_to_samples(LOOKAHEAD_MS).round() as usize;
        self.lookahead = [
            DelayLine::with_max_delay(self.lookahead_samples),
            DelayLine::with_max_delay(self.lookahead_samples),
        ];
        for detector in &mut self.detectors {
            detector.set_sample_rate(spec.sample_rate);
        }
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_THRESHOLD => self.config.set_threshold_db(value),
            PARAM_RATIO => self.config.set_ratio(value),
            PARAM_ATTACK => self.config.set_attack_ms(value),
            PARAM_RELEASE => self.config.set_release_ms(value),
            PARAM_KNEE => self.config.set_knee_db(value),
            PARAM_MAKEUP => self.config.set_makeup_db(value),
            PARAM_DETECTOR => {
                self.config.detector = if value >= 0.5 {
                    DetectorMode::Rms
                } else {
                    DetectorMode::Peak
                };
            }
            PARAM_LINK => self.config.link = value >= 0.5,
            PARAM_MIX => self.config.set_mix(value),
            _ => return,
        }
        self.sync_detectors();
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let mix = self.config.mix;
        let delay = self.lookahead_samples;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (gain_l, gain_r) = if self.config.link {
                let level = self.detectors[0].process_stereo(*l, *r);
                let g = self.gain_for(0, level);
                self.gain_reduction_db[1] = self.gain_reduction_db[0];
                (g, g)
            } else {
                let level_l = self.detectors[0].process(*l);
                let level_r = self.detectors[1].process(*r);
                (self.gain_for(0, level_l), self.gain_for(1, level_r))
            };

            self.lookahead[0].write(*l);
            self.lookahead[1].write(*r);
            let dry_l = self.lookahead[0].read_integer(delay);
            let dry_r = self.lookahead[1].read_integer(delay);

            *l = blend(dry_l, dry_l * gain_l, mix);
            *r = blend(dry_r, dry_r * gain_r, mix);
        }
    }

    fn reset(&mut self) {
        for detector in &mut self.detectors {
            detector.reset();
        }
        for line in &mut self.lookahead {
            line.clear();
        }
        self.gain_reduction_db = [0.0; 2];
    }

    fn latency_samples(&self) -> usize {
        self.lookahead_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_static_curve() {
        let config = CompressorConfig {
            knee_db: 0.0,
            ..CompressorConfig::default()
        };
        assert_eq!(config.gain_reduction_db(-30.0), 0.0);
        // 12 dB over at 4:1 → 9 dB reduction
        assert_relative_eq!(config.gain_reduction_db(-6.0), 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_knee_is_continuous() {
        let config = CompressorConfig::default();
        let edge = config.threshold_db + config.knee_db / 2.0;
        let inside = config.gain_reduction_db(edge - 1e-9);
        let outside = config.gain_reduction_db(edge + 1e-9);
        assert!((inside - outside).abs() < 1e-6);
    }

    #[test]
    fn test_latency_is_lookahead() {
        let mut comp = Compressor::new();
        comp.prepare(&ProcessSpec::new(48000.0, 256));
        assert_eq!(comp.latency_samples(), 72);

        let mut l = vec![0.0; 128];
        l[0] = 0.01;
        let mut r = l.clone();
        comp.process_stereo(&mut l, &mut r);
        assert!(l[72] > 0.0);
        assert!(l[..72].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_loud_signal_is_reduced() {
        let mut comp = Compressor::new();
        comp.prepare(&ProcessSpec::new(48000.0, 4800));
        let mut l = vec![0.9; 4800];
        let mut r = vec![0.9; 4800];
        comp.process_stereo(&mut l, &mut r);
        assert!(l[4799] < 0.5);
        assert!(comp.gain_reduction_db()[0] > 6.0);
    }
}
