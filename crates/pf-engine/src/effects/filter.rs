//! Multimode filter

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample};
use pf_dsp::{
    FilterSpec, FilterType, Processor, ProcessorConfig, SmoothedParam, SmoothingType,
    StereoBiquad, StereoProcessor,
};
use serde::{Deserialize, Serialize};

use super::{CONTROL_INTERVAL, EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_TYPE: ParamId = ParamId(0);
pub const PARAM_FREQUENCY: ParamId = ParamId(1);
pub const PARAM_Q: ParamId = ParamId(2);
pub const PARAM_GAIN: ParamId = ParamId(3);
pub const PARAM_MIX: ParamId = ParamId(4);

static PARAMS: [ParamSpec; 5] = [
    ParamSpec::new(0, "type", "", ParamRange::stepped(0.0, 7.0, 0.0)),
    ParamSpec::new(1, "frequency", "Hz", ParamRange::logarithmic(20.0, 20000.0, 1000.0)),
    ParamSpec::new(2, "q", "", ParamRange::logarithmic(0.1, 20.0, 0.707)),
    ParamSpec::new(3, "gain", "dB", ParamRange::linear(-24.0, 24.0, 0.0)),
    ParamSpec::new(4, "mix", "", ParamRange::linear(0.0, 1.0, 1.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Filter",
    kind: EffectKind::Filter,
    params: &PARAMS,
    capabilities: Capabilities::NONE,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub filter_type: FilterType,
    pub frequency: f64,
    pub q: f64,
    pub gain_db: f64,
    pub mix: f64,
}

impl FilterConfig {
    pub fn set_frequency(&mut self, hz: f64) {
        self.frequency = clamp_or(hz, 20.0, 20000.0, 1000.0);
    }

    pub fn set_q(&mut self, q: f64) {
        self.q = clamp_or(q, 0.1, 20.0, 0.707);
    }

    pub fn set_gain_db(&mut self, db: f64) {
        self.gain_db = clamp_or(db, -24.0, 24.0, 0.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 1.0);
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            filter_type: FilterType::Lowpass,
            frequency: 1000.0,
            q: 0.707,
            gain_db: 0.0,
            mix: 1.0,
        }
    }
}

pub struct Filter {
    config: FilterConfig,
    biquad: StereoBiquad,
    frequency: SmoothedParam,
    gain: SmoothedParam,
    countdown: usize,
}

impl Filter {
    pub fn new() -> Self {
        Self::with_config(FilterConfig::default())
    }

    pub fn with_config(config: FilterConfig) -> Self {
        let sample_rate = ProcessSpec::default().sample_rate;
        Self {
            config,
            biquad: StereoBiquad::new(sample_rate),
            frequency: SmoothedParam::new(
                config.frequency,
                20.0,
                sample_rate,
                SmoothingType::Exponential,
            ),
            gain: SmoothedParam::linear(config.gain_db, 20.0, sample_rate),
            countdown: 0,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Coefficient redesigns so far
    pub fn recomputations(&self) -> u64 {
        self.biquad.recomputations()
    }

    fn update_coeffs(&mut self) {
        let spec = FilterSpec::new(
            self.config.filter_type,
            self.frequency.current(),
            self.config.q,
            self.gain.current(),
        );
        self.biquad.set_spec(&spec);
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Filter {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.biquad.set_sample_rate(spec.sample_rate);
        self.frequency.set_sample_rate(spec.sample_rate);
        self.gain.set_sample_rate(spec.sample_rate);
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_TYPE => self.config.filter_type = FilterType::from_index(value as usize),
            PARAM_FREQUENCY => {
                self.config.set_frequency(value);
                self.frequency.set_target(self.config.frequency);
            }
            PARAM_Q => self.config.set_q(value),
            PARAM_GAIN => {
                self.config.set_gain_db(value);
                self.gain.set_target(self.config.gain_db);
            }
            PARAM_MIX => self.config.set_mix(value),
            _ => {}
        }
        self.countdown = 0;
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let mix = self.config.mix;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.countdown == 0 {
                self.update_coeffs();
                self.countdown = CONTROL_INTERVAL;
            }
            self.countdown -= 1;
            // Smoothers advance per sample, coefficients follow at control rate
            self.frequency.next();
            self.gain.next();

            let (wet_l, wet_r) = self.biquad.process_sample(*l, *r);
            *l = blend(*l, wet_l, mix);
            *r = blend(*r, wet_r, mix);
        }
    }

    fn reset(&mut self) {
        self.biquad.reset();
        self.frequency.set_immediate(self.config.frequency);
        self.gain.set_immediate(self.config.gain_db);
        self.countdown = 0;
        self.update_coeffs();
    }
}
