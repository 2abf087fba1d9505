//! Tremolo / auto-pan
//!
//! `gain = 1 − depth · lfo`, with the LFO in its unipolar form. A spread of
//! 0.5 cycles puts the channels in anti-phase, which turns tremolo into
//! auto-pan. The gain passes through a short one-pole so square and
//! random waveforms switch without clicks.

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample};
use pf_dsp::envelope::time_constant_coeff;
use pf_dsp::{Lfo, SmoothedParam, Waveform};
use serde::{Deserialize, Serialize};

use super::{EffectKind, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_RATE: ParamId = ParamId(0);
pub const PARAM_DEPTH: ParamId = ParamId(1);
pub const PARAM_WAVEFORM: ParamId = ParamId(2);
pub const PARAM_SPREAD: ParamId = ParamId(3);

const EDGE_MS: f64 = 2.0;

static PARAMS: [ParamSpec; 4] = [
    ParamSpec::new(0, "rate", "Hz", ParamRange::logarithmic(0.1, 20.0, 5.0)),
    ParamSpec::new(1, "depth", "", ParamRange::linear(0.0, 1.0, 0.5)),
    ParamSpec::new(2, "waveform", "", ParamRange::stepped(0.0, 4.0, 0.0)),
    ParamSpec::new(3, "spread", "", ParamRange::linear(0.0, 0.5, 0.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Tremolo",
    kind: EffectKind::Tremolo,
    params: &PARAMS,
    capabilities: Capabilities::NONE,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TremoloConfig {
    pub rate_hz: f64,
    pub depth: f64,
    pub waveform: Waveform,
    pub spread: f64,
}

impl TremoloConfig {
    pub fn set_rate_hz(&mut self, hz: f64) {
        self.rate_hz = clamp_or(hz, 0.1, 20.0, 5.0);
    }

    pub fn set_depth(&mut self, depth: f64) {
        self.depth = clamp_or(depth, 0.0, 1.0, 0.5);
    }

    pub fn set_spread(&mut self, spread: f64) {
        self.spread = clamp_or(spread, 0.0, 0.5, 0.0);
    }
}

impl Default for TremoloConfig {
    fn default() -> Self {
        Self {
            rate_hz: 5.0,
            depth: 0.5,
            waveform: Waveform::Sine,
            spread: 0.0,
        }
    }
}

pub struct Tremolo {
    config: TremoloConfig,
    lfos: [Lfo; 2],
    depth: SmoothedParam,
    gains: [f64; 2],
    edge_coeff: f64,
}

impl Tremolo {
    pub fn new() -> Self {
        let sample_rate = ProcessSpec::default().sample_rate;
        let config = TremoloConfig::default();
        let mut tremolo = Self {
            config,
            lfos: [Lfo::with_seed(sample_rate, 11), Lfo::with_seed(sample_rate, 11)],
            depth: SmoothedParam::linear(config.depth, 20.0, sample_rate),
            gains: [1.0; 2],
            edge_coeff: time_constant_coeff(EDGE_MS, sample_rate),
        };
        tremolo.configure_lfos();
        tremolo
    }

    pub fn config(&self) -> &TremoloConfig {
        &self.config
    }

    fn configure_lfos(&mut self) {
        for lfo in &mut self.lfos {
            lfo.set_frequency(self.config.rate_hz);
            lfo.set_waveform(self.config.waveform);
        }
        self.lfos[1].set_phase_offset(self.config.spread);
    }
}

impl Default for Tremolo {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Tremolo {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        for lfo in &mut self.lfos {
            lfo.set_sample_rate(spec.sample_rate);
        }
        self.depth.set_sample_rate(spec.sample_rate);
        self.edge_coeff = time_constant_coeff(EDGE_MS, spec.sample_rate);
        self.configure_lfos();
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_RATE => self.config.set_rate_hz(value),
            PARAM_DEPTH => {
                self.config.set_depth(value);
                self.depth.set_target(self.config.depth);
            }
            PARAM_WAVEFORM => self.config.waveform = Waveform::from_index(value as usize),
            PARAM_SPREAD => self.config.set_spread(value),
            _ => return,
        }
        self.configure_lfos();
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let k = self.edge_coeff;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let depth = self.depth.next();
            for (ch, sample) in [l, r].into_iter().enumerate() {
                let target = 1.0 - depth * self.lfos[ch].tick_unipolar();
                self.gains[ch] = target + k * (self.gains[ch] - target);
                *sample *= self.gains[ch];
            }
        }
    }

    fn reset(&mut self) {
        for lfo in &mut self.lfos {
            lfo.reset();
        }
        self.depth.set_immediate(self.config.depth);
        let depth = self.config.depth;
        for (gain, lfo) in self.gains.iter_mut().zip(&self.lfos) {
            *gain = 1.0 - depth * 0.5 * (lfo.value() + 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared() -> Tremolo {
        let mut trem = Tremolo::new();
        trem.prepare(&ProcessSpec::new(48000.0, 512));
        trem
    }

    #[test]
    fn test_zero_depth_is_transparent() {
        let mut trem = prepared();
        trem.set_param(PARAM_DEPTH, 0.0);
        trem.reset();
        let mut l = vec![0.5; 4800];
        let mut r = vec![-0.5; 4800];
        trem.process_stereo(&mut l, &mut r);
        assert!(l.iter().all(|&v| (v - 0.5).abs() < 1e-12));
        assert!(r.iter().all(|&v| (v + 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_full_depth_swings_gain() {
        let mut trem = prepared();
        trem.set_param(PARAM_DEPTH, 1.0);
        trem.set_param(PARAM_RATE, 5.0);
        trem.reset();
        let mut l = vec![1.0; 48000];
        let mut r = l.clone();
        trem.process_stereo(&mut l, &mut r);
        let min = l.iter().cloned().fold(f64::MAX, f64::min);
        let max = l.iter().cloned().fold(f64::MIN, f64::max);
        assert!(min < 0.05, "min {min}");
        assert!(max > 0.95, "max {max}");
        assert!(l.iter().all(|&v| (0.0..=1.0 + 1e-12).contains(&v)));
    }

    #[test]
    fn test_anti_phase_spread_pans() {
        let mut trem = prepared();
        trem.set_param(PARAM_DEPTH, 1.0);
        trem.set_param(PARAM_SPREAD, 0.5);
        trem.reset();
        let mut l = vec![1.0; 24000];
        let mut r = l.clone();
        trem.process_stereo(&mut l, &mut r);
        // Sine tremolo in anti-phase keeps the channel sum constant
        for (a, b) in l[2000..].iter().zip(&r[2000..]) {
            assert!((a + b - 1.0).abs() < 0.02);
        }
    }

    #[test]
    fn test_square_edges_are_smoothed() {
        let mut trem = prepared();
        trem.set_param(PARAM_DEPTH, 1.0);
        trem.set_param(PARAM_WAVEFORM, 2.0);
        trem.reset();
        let mut l = vec![1.0; 48000];
        let mut r = l.clone();
        trem.process_stereo(&mut l, &mut r);
        let max_step = l.windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0, f64::max);
        assert!(max_step < 0.05, "step {max_step}");
    }
}
