//! The closed set of effects
//!
//! Each effect is a thin configuration of pf-dsp primitives: a typed,
//! serde-friendly config with clamped setters, a static parameter table
//! routed onto that config, and the per-channel signal state.

mod auto_wah;
mod cabinet;
mod chorus;
mod compressor;
mod delay;
mod filter;
mod looper;
mod neural_amp;
mod noise_gate;
mod overdrive;
mod reverb;
mod tremolo;

pub use auto_wah::{AutoWah, AutoWahConfig};
pub use cabinet::{Cabinet, CabinetConfig, CabinetLoader};
pub use chorus::{Chorus, ChorusConfig, ModulationMode};
pub use compressor::{Compressor, CompressorConfig};
pub use delay::{Delay, DelayConfig};
pub use filter::{Filter, FilterConfig};
pub use looper::{Looper, LooperCommand, LooperConfig, LooperControl, LooperState};
pub use neural_amp::{NeuralAmp, NeuralAmpConfig, NeuralAmpLoader, StereoLstm};
pub use noise_gate::{GateState, NoiseGate, NoiseGateConfig};
pub use overdrive::{Overdrive, OverdriveConfig};
pub use reverb::{Reverb, ReverbConfig};
pub use tremolo::{Tremolo, TremoloConfig};

use pf_core::Sample;
use serde::{Deserialize, Serialize};

use crate::effect::Effect;

/// Samples between control-rate updates (filter sweeps, envelope → cutoff)
pub const CONTROL_INTERVAL: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Filter,
    AutoWah,
    Compressor,
    NoiseGate,
    Delay,
    Chorus,
    Tremolo,
    Reverb,
    Overdrive,
    Cabinet,
    Looper,
    NeuralAmp,
}

impl EffectKind {
    pub const ALL: [EffectKind; 12] = [
        EffectKind::Filter,
        EffectKind::AutoWah,
        EffectKind::Compressor,
        EffectKind::NoiseGate,
        EffectKind::Delay,
        EffectKind::Chorus,
        EffectKind::Tremolo,
        EffectKind::Reverb,
        EffectKind::Overdrive,
        EffectKind::Cabinet,
        EffectKind::Looper,
        EffectKind::NeuralAmp,
    ];

    /// Lookup by the names hosts and presets use
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "filter" | "eq" => Some(EffectKind::Filter),
            "autowah" | "auto-wah" | "auto_wah" | "wah" => Some(EffectKind::AutoWah),
            "compressor" | "comp" => Some(EffectKind::Compressor),
            "noisegate" | "noise-gate" | "gate" => Some(EffectKind::NoiseGate),
            "delay" | "echo" => Some(EffectKind::Delay),
            "chorus" | "flanger" | "vibrato" => Some(EffectKind::Chorus),
            "tremolo" | "trem" => Some(EffectKind::Tremolo),
            "reverb" | "verb" => Some(EffectKind::Reverb),
            "overdrive" | "drive" | "distortion" => Some(EffectKind::Overdrive),
            "cabinet" | "cab" | "ir" => Some(EffectKind::Cabinet),
            "looper" | "loop" => Some(EffectKind::Looper),
            "neuralamp" | "neural-amp" | "amp" => Some(EffectKind::NeuralAmp),
            _ => None,
        }
    }
}

/// Build a default-configured effect. Resources (IRs, models) are
/// attached afterwards through the effect's own API.
pub fn create_effect(kind: EffectKind) -> Box<dyn Effect> {
    match kind {
        EffectKind::Filter => Box::new(Filter::new()),
        EffectKind::AutoWah => Box::new(AutoWah::new()),
        EffectKind::Compressor => Box::new(Compressor::new()),
        EffectKind::NoiseGate => Box::new(NoiseGate::new()),
        EffectKind::Delay => Box::new(Delay::new()),
        EffectKind::Chorus => Box::new(Chorus::new()),
        EffectKind::Tremolo => Box::new(Tremolo::new()),
        EffectKind::Reverb => Box::new(Reverb::new()),
        EffectKind::Overdrive => Box::new(Overdrive::new()),
        EffectKind::Cabinet => Box::new(Cabinet::new()),
        EffectKind::Looper => Box::new(Looper::new()),
        EffectKind::NeuralAmp => Box::new(NeuralAmp::new()),
    }
}

/// Equal-gain dry/wet blend
#[inline(always)]
pub(crate) fn blend(dry: Sample, wet: Sample, mix: f64) -> Sample {
    dry + (wet - dry) * mix
}

/// Clamp a possibly non-finite control value, falling back to `default`
#[inline]
pub(crate) fn clamp_or(value: f64, min: f64, max: f64, default: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        default
    }
}
