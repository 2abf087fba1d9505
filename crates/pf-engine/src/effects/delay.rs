//! Feedback delay with damping and ping-pong
//!
//! One `step()` per frame, in two phases: read the echo written one delay
//! period ago, then write `soft_clip(input + damped echo · feedback)`.
//! Feedback is capped at `MAX_FEEDBACK` and every write is soft clipped,
//! so the loop stays bounded whatever the settings.

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample};
use pf_dsp::saturation::soft_clip;
use pf_dsp::{
    DelayLine, FilterSpec, MAX_FEEDBACK, Processor, ProcessorConfig, SmoothedParam,
    SmoothingType, StereoBiquad,
};
use serde::{Deserialize, Serialize};

use super::{EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_TIME: ParamId = ParamId(0);
pub const PARAM_FEEDBACK: ParamId = ParamId(1);
pub const PARAM_MIX: ParamId = ParamId(2);
pub const PARAM_DAMPING: ParamId = ParamId(3);
pub const PARAM_PING_PONG: ParamId = ParamId(4);

pub const MAX_DELAY_MS: f64 = 2000.0;

static PARAMS: [ParamSpec; 5] = [
    ParamSpec::new(0, "time", "ms", ParamRange::logarithmic(1.0, MAX_DELAY_MS, 350.0)),
    ParamSpec::new(1, "feedback", "", ParamRange::linear(0.0, MAX_FEEDBACK, 0.4)),
    ParamSpec::new(2, "mix", "", ParamRange::linear(0.0, 1.0, 0.35)),
    ParamSpec::new(3, "damping", "Hz", ParamRange::logarithmic(500.0, 20000.0, 6000.0)),
    ParamSpec::new(4, "ping_pong", "", ParamRange::toggle(false)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Delay",
    kind: EffectKind::Delay,
    params: &PARAMS,
    capabilities: Capabilities::NONE,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    pub time_ms: f64,
    pub feedback: f64,
    pub mix: f64,
    pub damping_hz: f64,
    pub ping_pong: bool,
}

impl DelayConfig {
    pub fn set_time_ms(&mut self, ms: f64) {
        self.time_ms = clamp_or(ms, 1.0, MAX_DELAY_MS, 350.0);
    }

    /// Capped at `MAX_FEEDBACK`
    pub fn set_feedback(&mut self, feedback: f64) {
        self.feedback = clamp_or(feedback, 0.0, MAX_FEEDBACK, 0.4);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 0.35);
    }

    pub fn set_damping_hz(&mut self, hz: f64) {
        self.damping_hz = clamp_or(hz, 500.0, 20000.0, 6000.0);
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            time_ms: 350.0,
            feedback: 0.4,
            mix: 0.35,
            damping_hz: 6000.0,
            ping_pong: false,
        }
    }
}

pub struct Delay {
    config: DelayConfig,
    lines: [DelayLine; 2],
    damping: StereoBiquad,
    /// Delay time in samples, glided to avoid zipper noise
    time: SmoothedParam,
    sample_rate: f64,
}

impl Delay {
    pub fn new() -> Self {
        Self::with_config(DelayConfig::default())
    }

    pub fn with_config(config: DelayConfig) -> Self {
        let sample_rate = ProcessSpec::default().sample_rate;
        let mut delay = Self {
            config,
            lines: [DelayLine::with_max_delay(1), DelayLine::with_max_delay(1)],
            damping: StereoBiquad::new(sample_rate),
            time: SmoothedParam::new(0.0, 60.0, sample_rate, SmoothingType::Exponential),
            sample_rate,
        };
        delay.allocate();
        delay
    }

    pub fn config(&self) -> &DelayConfig {
        &self.config
    }

    fn allocate(&mut self) {
        let max = (MAX_DELAY_MS * 0.001 * self.sample_rate).ceil() as usize + 1;
        self.lines = [DelayLine::with_max_delay(max), DelayLine::with_max_delay(max)];
    }

    fn time_samples(&self) -> f64 {
        self.config.time_ms * 0.001 * self.sample_rate
    }

    fn update_damping(&mut self) {
        let spec = FilterSpec::lowpass(self.config.damping_hz, std::f64::consts::FRAC_1_SQRT_2);
        self.damping.set_spec(&spec);
    }

    /// One frame: read the previous state, then write the new one
    #[inline]
    fn step(&mut self, in_l: Sample, in_r: Sample) -> (Sample, Sample) {
        // Reading before the write: the echo from D frames ago is at D − 1
        let read_at = (self.time.next() - 1.0).max(0.0);
        let echo_l = self.lines[0].read_cubic(read_at);
        let echo_r = self.lines[1].read_cubic(read_at);

        let fb = self.config.feedback;
        let back_l = self.damping.process_left(echo_l) * fb;
        let back_r = self.damping.process_right(echo_r) * fb;

        if self.config.ping_pong {
            // Input enters on the left; each repeat crosses over
            self.lines[0].write(soft_clip(0.5 * (in_l + in_r) + back_r));
            self.lines[1].write(soft_clip(back_l));
        } else {
            self.lines[0].write(soft_clip(in_l + back_l));
            self.lines[1].write(soft_clip(in_r + back_r));
        }

        (echo_l, echo_r)
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Delay {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.allocate();
        self.damping.set_sample_rate(spec.sample_rate);
        self.time.set_sample_rate(spec.sample_rate);
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_TIME => {
                self.config.set_time_ms(value);
                self.time.set_target(self.time_samples());
            }
            PARAM_FEEDBACK => self.config.set_feedback(value),
            PARAM_MIX => self.config.set_mix(value),
            PARAM_DAMPING => {
                self.config.set_damping_hz(value);
                self.update_damping();
            }
            PARAM_PING_PONG => self.config.ping_pong = value >= 0.5,
            _ => {}
        }
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let mix = self.config.mix;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (wet_l, wet_r) = self.step(*l, *r);
            *l = blend(*l, wet_l, mix);
            *r = blend(*r, wet_r, mix);
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.damping.reset();
        self.time.set_immediate(self.time_samples());
        self.update_damping();
    }
}
