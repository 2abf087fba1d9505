//! Overdrive
//!
//! Highpass pre-emphasis (tightens the low end before clipping), drive into
//! a `Saturator` curve, then a lowpass tone control. The shaper is
//! memoryless; all state lives in the two biquads.

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample, db_to_gain};
use pf_dsp::saturation::{ClipCurve, Saturator};
use pf_dsp::{FilterSpec, MonoProcessor, Processor, ProcessorConfig, StereoBiquad};
use serde::{Deserialize, Serialize};

use super::{EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_DRIVE: ParamId = ParamId(0);
pub const PARAM_TONE: ParamId = ParamId(1);
pub const PARAM_LEVEL: ParamId = ParamId(2);
pub const PARAM_CURVE: ParamId = ParamId(3);
pub const PARAM_MIX: ParamId = ParamId(4);

const PRE_EMPHASIS_HZ: f64 = 120.0;

static PARAMS: [ParamSpec; 5] = [
    ParamSpec::new(0, "drive", "dB", ParamRange::linear(0.0, 48.0, 18.0)),
    ParamSpec::new(1, "tone", "Hz", ParamRange::logarithmic(500.0, 12000.0, 4000.0)),
    ParamSpec::new(2, "level", "dB", ParamRange::linear(-24.0, 12.0, -6.0)),
    ParamSpec::new(3, "curve", "", ParamRange::stepped(0.0, 4.0, 0.0)),
    ParamSpec::new(4, "mix", "", ParamRange::linear(0.0, 1.0, 1.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Overdrive",
    kind: EffectKind::Overdrive,
    params: &PARAMS,
    capabilities: Capabilities::NONE,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverdriveConfig {
    pub drive_db: f64,
    pub tone_hz: f64,
    pub level_db: f64,
    pub curve: ClipCurve,
    pub mix: f64,
}

impl OverdriveConfig {
    pub fn set_drive_db(&mut self, db: f64) {
        self.drive_db = clamp_or(db, 0.0, 48.0, 18.0);
    }

    pub fn set_tone_hz(&mut self, hz: f64) {
        self.tone_hz = clamp_or(hz, 500.0, 12000.0, 4000.0);
    }

    pub fn set_level_db(&mut self, db: f64) {
        self.level_db = clamp_or(db, -24.0, 12.0, -6.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 1.0);
    }
}

impl Default for OverdriveConfig {
    fn default() -> Self {
        Self {
            drive_db: 18.0,
            tone_hz: 4000.0,
            level_db: -6.0,
            curve: ClipCurve::Tanh,
            mix: 1.0,
        }
    }
}

pub struct Overdrive {
    config: OverdriveConfig,
    emphasis: StereoBiquad,
    tone: StereoBiquad,
    shaper: Saturator,
    level: f64,
}

impl Overdrive {
    pub fn new() -> Self {
        let sample_rate = ProcessSpec::default().sample_rate;
        let mut drive = Self {
            config: OverdriveConfig::default(),
            emphasis: StereoBiquad::new(sample_rate),
            tone: StereoBiquad::new(sample_rate),
            shaper: Saturator::new(),
            level: 1.0,
        };
        drive.update_filters();
        drive.update_shaper();
        drive
    }

    pub fn config(&self) -> &OverdriveConfig {
        &self.config
    }

    fn update_filters(&mut self) {
        let q = std::f64::consts::FRAC_1_SQRT_2;
        self.emphasis.set_spec(&FilterSpec::highpass(PRE_EMPHASIS_HZ, q));
        self.tone.set_spec(&FilterSpec::lowpass(self.config.tone_hz, q));
    }

    fn update_shaper(&mut self) {
        self.shaper.set_curve(self.config.curve);
        self.shaper.set_drive_db(self.config.drive_db);
        self.level = db_to_gain(self.config.level_db);
    }
}

impl Default for Overdrive {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Overdrive {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.emphasis.set_sample_rate(spec.sample_rate);
        self.tone.set_sample_rate(spec.sample_rate);
        self.update_filters();
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_DRIVE => self.config.set_drive_db(value),
            PARAM_TONE => {
                self.config.set_tone_hz(value);
                self.update_filters();
            }
            PARAM_LEVEL => self.config.set_level_db(value),
            PARAM_CURVE => self.config.curve = ClipCurve::from_index(value.max(0.0) as usize),
            PARAM_MIX => self.config.set_mix(value),
            _ => return,
        }
        self.update_shaper();
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let mix = self.config.mix;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let wet_l = self.emphasis.process_left(*l);
            let wet_r = self.emphasis.process_right(*r);
            let wet_l = self.tone.process_left(self.shaper.process_sample(wet_l)) * self.level;
            let wet_r = self.tone.process_right(self.shaper.process_sample(wet_r)) * self.level;
            *l = blend(*l, wet_l, mix);
            *r = blend(*r, wet_r, mix);
        }
    }

    fn reset(&mut self) {
        self.emphasis.reset();
        self.tone.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_dsp::analysis::{peak, rms, sine, thd};

    fn prepared() -> Overdrive {
        let mut od = Overdrive::new();
        od.prepare(&ProcessSpec::new(48000.0, 512));
        od
    }

    fn run(od: &mut Overdrive, input: &[f64]) -> Vec<f64> {
        let mut l = input.to_vec();
        let mut r = input.to_vec();
        od.process_stereo(&mut l, &mut r);
        assert_eq!(l, r);
        l
    }

    #[test]
    fn test_output_bounded_by_level() {
        let mut od = prepared();
        od.set_param(PARAM_DRIVE, 48.0);
        od.set_param(PARAM_LEVEL, 0.0);
        let out = run(&mut od, &sine(220.0, 48000.0, 10.0, 48000));
        // Clipped to ±1, the tone lowpass may ring a little past it
        assert!(peak(&out) < 1.5);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_more_drive_more_harmonics() {
        let input = sine(500.0, 48000.0, 0.3, 16384);

        let mut clean = prepared();
        clean.set_param(PARAM_DRIVE, 0.0);
        clean.set_param(PARAM_TONE, 12000.0);
        let clean_out = run(&mut clean, &input);

        let mut dirty = prepared();
        dirty.set_param(PARAM_DRIVE, 36.0);
        dirty.set_param(PARAM_TONE, 12000.0);
        let dirty_out = run(&mut dirty, &input);

        let clean_thd = thd(&clean_out[8192..], 500.0, 48000.0, 9);
        let dirty_thd = thd(&dirty_out[8192..], 500.0, 48000.0, 9);
        assert!(dirty_thd > clean_thd * 4.0, "{dirty_thd} vs {clean_thd}");
    }

    #[test]
    fn test_tone_darkens() {
        let input = sine(6000.0, 48000.0, 0.05, 24000);
        let mut bright = prepared();
        bright.set_param(PARAM_TONE, 12000.0);
        let mut dark = prepared();
        dark.set_param(PARAM_TONE, 500.0);
        let b = run(&mut bright, &input);
        let d = run(&mut dark, &input);
        assert!(rms(&d[4800..]) < rms(&b[4800..]) * 0.1);
    }

    #[test]
    fn test_zero_mix_is_dry() {
        let mut od = prepared();
        od.set_param(PARAM_MIX, 0.0);
        let input = sine(300.0, 48000.0, 0.8, 1024);
        assert_eq!(run(&mut od, &input), input);
    }
}
