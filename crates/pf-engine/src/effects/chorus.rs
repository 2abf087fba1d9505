//! Modulated delay: chorus, flanger and vibrato voicings
//!
//! Each channel reads its own delay line at `base + depth · lfo`, with the
//! right LFO offset in phase for width. Reads are cubic so the moving tap
//! stays clean. The flanger voicing adds feedback around the line.

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample};
use pf_dsp::saturation::soft_clip;
use pf_dsp::{DelayLine, Lfo, MAX_FEEDBACK, Waveform};
use serde::{Deserialize, Serialize};

use super::{EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_MODE: ParamId = ParamId(0);
pub const PARAM_RATE: ParamId = ParamId(1);
pub const PARAM_DEPTH: ParamId = ParamId(2);
pub const PARAM_DELAY: ParamId = ParamId(3);
pub const PARAM_FEEDBACK: ParamId = ParamId(4);
pub const PARAM_SPREAD: ParamId = ParamId(5);
pub const PARAM_MIX: ParamId = ParamId(6);

const MAX_DEPTH_MS: f64 = 10.0;
const MAX_BASE_MS: f64 = 30.0;

static PARAMS: [ParamSpec; 7] = [
    ParamSpec::new(0, "mode", "", ParamRange::stepped(0.0, 2.0, 0.0)),
    ParamSpec::new(1, "rate", "Hz", ParamRange::logarithmic(0.05, 10.0, 0.8)),
    ParamSpec::new(2, "depth", "ms", ParamRange::linear(0.0, MAX_DEPTH_MS, 3.0)),
    ParamSpec::new(3, "delay", "ms", ParamRange::linear(0.5, MAX_BASE_MS, 12.0)),
    ParamSpec::new(4, "feedback", "", ParamRange::linear(-0.9, 0.9, 0.0)),
    ParamSpec::new(5, "spread", "", ParamRange::linear(0.0, 0.5, 0.25)),
    ParamSpec::new(6, "mix", "", ParamRange::linear(0.0, 1.0, 0.5)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Chorus",
    kind: EffectKind::Chorus,
    params: &PARAMS,
    capabilities: Capabilities::NONE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModulationMode {
    #[default]
    Chorus,
    Flanger,
    /// Fully wet, pitch modulation only
    Vibrato,
}

impl ModulationMode {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => ModulationMode::Flanger,
            2 => ModulationMode::Vibrato,
            _ => ModulationMode::Chorus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusConfig {
    pub mode: ModulationMode,
    pub rate_hz: f64,
    pub depth_ms: f64,
    pub delay_ms: f64,
    pub feedback: f64,
    pub spread: f64,
    pub mix: f64,
}

impl ChorusConfig {
    pub fn set_rate_hz(&mut self, hz: f64) {
        self.rate_hz = clamp_or(hz, 0.05, 10.0, 0.8);
    }

    pub fn set_depth_ms(&mut self, ms: f64) {
        self.depth_ms = clamp_or(ms, 0.0, MAX_DEPTH_MS, 3.0);
    }

    pub fn set_delay_ms(&mut self, ms: f64) {
        self.delay_ms = clamp_or(ms, 0.5, MAX_BASE_MS, 12.0);
    }

    pub fn set_feedback(&mut self, feedback: f64) {
        self.feedback = clamp_or(feedback, -0.9, 0.9, 0.0);
    }

    /// Phase offset of the right LFO, in cycles
    pub fn set_spread(&mut self, spread: f64) {
        self.spread = clamp_or(spread, 0.0, 0.5, 0.25);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 0.5);
    }

    fn effective_mix(&self) -> f64 {
        match self.mode {
            ModulationMode::Vibrato => 1.0,
            _ => self.mix,
        }
    }

    fn effective_feedback(&self) -> f64 {
        match self.mode {
            ModulationMode::Flanger => self.feedback.clamp(-MAX_FEEDBACK, MAX_FEEDBACK),
            _ => 0.0,
        }
    }
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            mode: ModulationMode::Chorus,
            rate_hz: 0.8,
            depth_ms: 3.0,
            delay_ms: 12.0,
            feedback: 0.0,
            spread: 0.25,
            mix: 0.5,
        }
    }
}

pub struct Chorus {
    config: ChorusConfig,
    lines: [DelayLine; 2],
    lfos: [Lfo; 2],
    last: [Sample; 2],
    sample_rate: f64,
}

impl Chorus {
    pub fn new() -> Self {
        let sample_rate = ProcessSpec::default().sample_rate;
        let mut chorus = Self {
            config: ChorusConfig::default(),
            lines: [DelayLine::with_max_delay(1), DelayLine::with_max_delay(1)],
            lfos: [Lfo::with_seed(sample_rate, 1), Lfo::with_seed(sample_rate, 2)],
            last: [0.0; 2],
            sample_rate,
        };
        chorus.allocate();
        chorus.configure_lfos();
        chorus
    }

    pub fn config(&self) -> &ChorusConfig {
        &self.config
    }

    fn allocate(&mut self) {
        let max_ms = MAX_BASE_MS + MAX_DEPTH_MS;
        let max = (max_ms * 0.001 * self.sample_rate).ceil() as usize + 2;
        self.lines = [DelayLine::with_max_delay(max), DelayLine::with_max_delay(max)];
    }

    fn configure_lfos(&mut self) {
        for lfo in &mut self.lfos {
            lfo.set_waveform(Waveform::Sine);
            lfo.set_frequency(self.config.rate_hz);
        }
        self.lfos[0].set_phase_offset(0.0);
        self.lfos[1].set_phase_offset(self.config.spread);
    }
}

impl Default for Chorus {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Chorus {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.allocate();
        for lfo in &mut self.lfos {
            lfo.set_sample_rate(spec.sample_rate);
        }
        self.configure_lfos();
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_MODE => self.config.mode = ModulationMode::from_index(value as usize),
            PARAM_RATE => self.config.set_rate_hz(value),
            PARAM_DEPTH => self.config.set_depth_ms(value),
            PARAM_DELAY => self.config.set_delay_ms(value),
            PARAM_FEEDBACK => self.config.set_feedback(value),
            PARAM_SPREAD => self.config.set_spread(value),
            PARAM_MIX => self.config.set_mix(value),
            _ => return,
        }
        self.configure_lfos();
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let ms = 0.001 * self.sample_rate;
        let base = self.config.delay_ms * ms;
        let depth = self.config.depth_ms * ms;
        let feedback = self.config.effective_feedback();
        let mix = self.config.effective_mix();

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            for (ch, sample) in [l, r].into_iter().enumerate() {
                let offset = base + depth * self.lfos[ch].tick_unipolar();
                let line = &mut self.lines[ch];
                line.write(soft_clip(*sample + feedback * self.last[ch]));
                let wet = line.read_cubic(offset);
                self.last[ch] = wet;
                *sample = blend(*sample, wet, mix);
            }
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        for lfo in &mut self.lfos {
            lfo.reset();
        }
        self.last = [0.0; 2];
    }
}
