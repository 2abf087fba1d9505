//! Algorithmic reverb
//!
//! Schroeder/Moorer topology in the Freeverb tuning: eight damped combs in
//! parallel feeding four series all-passes, per channel. The right channel
//! runs slightly longer lines for decorrelation. Tunings are given at
//! 44.1 kHz and scaled to the running rate.

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample};
use pf_dsp::comb::{DampedComb, SchroederAllpass};
use pf_dsp::{DelayLine, MAX_FEEDBACK};
use serde::{Deserialize, Serialize};

use super::{EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_ROOM_SIZE: ParamId = ParamId(0);
pub const PARAM_DAMPING: ParamId = ParamId(1);
pub const PARAM_WIDTH: ParamId = ParamId(2);
pub const PARAM_PRE_DELAY: ParamId = ParamId(3);
pub const PARAM_MIX: ParamId = ParamId(4);

const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const TUNING_RATE: f64 = 44100.0;
const ALLPASS_GAIN: f64 = 0.5;
const INPUT_GAIN: f64 = 0.015;
const WET_GAIN: f64 = 3.0;
const MAX_PRE_DELAY_MS: f64 = 200.0;

static PARAMS: [ParamSpec; 5] = [
    ParamSpec::new(0, "room_size", "", ParamRange::linear(0.0, 1.0, 0.5)),
    ParamSpec::new(1, "damping", "", ParamRange::linear(0.0, 1.0, 0.5)),
    ParamSpec::new(2, "width", "", ParamRange::linear(0.0, 1.0, 1.0)),
    ParamSpec::new(3, "pre_delay", "ms", ParamRange::linear(0.0, MAX_PRE_DELAY_MS, 10.0)),
    ParamSpec::new(4, "mix", "", ParamRange::linear(0.0, 1.0, 0.3)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Reverb",
    kind: EffectKind::Reverb,
    params: &PARAMS,
    capabilities: Capabilities::STEREO_LINKED,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbConfig {
    pub room_size: f64,
    pub damping: f64,
    pub width: f64,
    pub pre_delay_ms: f64,
    pub mix: f64,
}

impl ReverbConfig {
    pub fn set_room_size(&mut self, size: f64) {
        self.room_size = clamp_or(size, 0.0, 1.0, 0.5);
    }

    pub fn set_damping(&mut self, damping: f64) {
        self.damping = clamp_or(damping, 0.0, 1.0, 0.5);
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = clamp_or(width, 0.0, 1.0, 1.0);
    }

    pub fn set_pre_delay_ms(&mut self, ms: f64) {
        self.pre_delay_ms = clamp_or(ms, 0.0, MAX_PRE_DELAY_MS, 10.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 0.3);
    }

    /// Comb feedback for the current room size, never above `MAX_FEEDBACK`
    pub fn comb_feedback(&self) -> f64 {
        (0.7 + 0.25 * self.room_size).min(MAX_FEEDBACK)
    }
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            width: 1.0,
            pre_delay_ms: 10.0,
            mix: 0.3,
        }
    }
}

/// One channel's comb bank and all-pass chain
struct Tank {
    combs: Vec<DampedComb>,
    allpasses: Vec<SchroederAllpass>,
}

impl Tank {
    fn new(sample_rate: f64, spread: usize) -> Self {
        let scale = sample_rate / TUNING_RATE;
        let scaled = |d: usize| (((d + spread) as f64) * scale).round() as usize;
        Self {
            combs: COMB_TUNING.iter().map(|&d| DampedComb::new(scaled(d))).collect(),
            allpasses: ALLPASS_TUNING
                .iter()
                .map(|&d| SchroederAllpass::new(scaled(d), ALLPASS_GAIN))
                .collect(),
        }
    }

    fn configure(&mut self, feedback: f64, damping: f64) {
        for comb in &mut self.combs {
            comb.set_feedback(feedback);
            comb.set_damping(damping);
        }
    }

    #[inline]
    fn process(&mut self, input: Sample) -> Sample {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input);
        }
        for ap in &mut self.allpasses {
            out = ap.process(out);
        }
        out
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(DampedComb::clear);
        self.allpasses.iter_mut().for_each(SchroederAllpass::clear);
    }
}

pub struct Reverb {
    config: ReverbConfig,
    tanks: [Tank; 2],
    pre_delay: DelayLine,
    sample_rate: f64,
}

impl Reverb {
    pub fn new() -> Self {
        let sample_rate = ProcessSpec::default().sample_rate;
        let mut reverb = Self {
            config: ReverbConfig::default(),
            tanks: [Tank::new(sample_rate, 0), Tank::new(sample_rate, STEREO_SPREAD)],
            pre_delay: DelayLine::with_max_time(MAX_PRE_DELAY_MS, sample_rate),
            sample_rate,
        };
        reverb.configure_tanks();
        reverb
    }

    pub fn config(&self) -> &ReverbConfig {
        &self.config
    }

    fn configure_tanks(&mut self) {
        let feedback = self.config.comb_feedback();
        // Freeverb damping scale
        let damping = self.config.damping * 0.4;
        for tank in &mut self.tanks {
            tank.configure(feedback, damping);
        }
    }

    fn pre_delay_samples(&self) -> usize {
        (self.config.pre_delay_ms * 0.001 * self.sample_rate).round() as usize
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Reverb {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.tanks = [
            Tank::new(spec.sample_rate, 0),
            Tank::new(spec.sample_rate, STEREO_SPREAD),
        ];
        self.pre_delay = DelayLine::with_max_time(MAX_PRE_DELAY_MS, spec.sample_rate);
        self.configure_tanks();
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_ROOM_SIZE => self.config.set_room_size(value),
            PARAM_DAMPING => self.config.set_damping(value),
            PARAM_WIDTH => self.config.set_width(value),
            PARAM_PRE_DELAY => self.config.set_pre_delay_ms(value),
            PARAM_MIX => self.config.set_mix(value),
            _ => return,
        }
        self.configure_tanks();
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let mix = self.config.mix;
        let width = self.config.width;
        let wet_direct = WET_GAIN * (0.5 + 0.5 * width);
        let wet_cross = WET_GAIN * (0.5 - 0.5 * width);
        let pre = self.pre_delay_samples().min(self.pre_delay.max_delay());

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.pre_delay.write(0.5 * (*l + *r) * INPUT_GAIN);
            let input = self.pre_delay.read_integer(pre);

            let out_l = self.tanks[0].process(input);
            let out_r = self.tanks[1].process(input);
            let wet_l = out_l * wet_direct + out_r * wet_cross;
            let wet_r = out_r * wet_direct + out_l * wet_cross;

            *l = blend(*l, wet_l, mix);
            *r = blend(*r, wet_r, mix);
        }
    }

    fn reset(&mut self) {
        for tank in &mut self.tanks {
            tank.clear();
        }
        self.pre_delay.clear();
    }
}
