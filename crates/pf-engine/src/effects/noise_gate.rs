//! Noise gate
//!
//! Instant-attack detector (peak, linked across channels) feeding a
//! three-state machine:
//!
//! ```text
//!            level ≥ open           level < close
//!   Closed ───────────────▶ Open ───────────────▶ Hold
//!      ▲                      ▲                     │
//!      │                      └─── level ≥ open ────┤
//!      └────────────────── hold expired ────────────┘
//! ```
//!
//! `close = open − hysteresis`. Gain moves toward 1 (Open/Hold) or the
//! range floor (Closed) with separate attack and release time constants.

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample, db_to_gain};
use pf_dsp::envelope::time_constant_coeff;
use pf_dsp::{DetectorMode, EnvelopeDetector, EnvelopePolicy, ParameterGate};
use serde::{Deserialize, Serialize};

use super::{EffectKind, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};

pub const PARAM_THRESHOLD: ParamId = ParamId(0);
pub const PARAM_HYSTERESIS: ParamId = ParamId(1);
pub const PARAM_ATTACK: ParamId = ParamId(2);
pub const PARAM_HOLD: ParamId = ParamId(3);
pub const PARAM_RELEASE: ParamId = ParamId(4);
pub const PARAM_RANGE: ParamId = ParamId(5);

/// Detector release; short so the state machine sees decays promptly
const DETECTOR_RELEASE_MS: f64 = 5.0;

static PARAMS: [ParamSpec; 6] = [
    ParamSpec::new(0, "threshold", "dB", ParamRange::linear(-90.0, 0.0, -50.0)),
    ParamSpec::new(1, "hysteresis", "dB", ParamRange::linear(0.0, 12.0, 4.0)),
    ParamSpec::new(2, "attack", "ms", ParamRange::logarithmic(0.05, 50.0, 0.5)),
    ParamSpec::new(3, "hold", "ms", ParamRange::linear(0.0, 500.0, 50.0)),
    ParamSpec::new(4, "release", "ms", ParamRange::logarithmic(5.0, 2000.0, 100.0)),
    ParamSpec::new(5, "range", "dB", ParamRange::linear(-90.0, 0.0, -80.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Noise Gate",
    kind: EffectKind::NoiseGate,
    params: &PARAMS,
    capabilities: Capabilities::STEREO_LINKED,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GateState {
    #[default]
    Closed,
    Open,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseGateConfig {
    pub threshold_db: f64,
    pub hysteresis_db: f64,
    pub attack_ms: f64,
    pub hold_ms: f64,
    pub release_ms: f64,
    pub range_db: f64,
}

impl NoiseGateConfig {
    pub fn set_threshold_db(&mut self, db: f64) {
        self.threshold_db = clamp_or(db, -90.0, 0.0, -50.0);
    }

    pub fn set_hysteresis_db(&mut self, db: f64) {
        self.hysteresis_db = clamp_or(db, 0.0, 12.0, 4.0);
    }

    pub fn set_attack_ms(&mut self, ms: f64) {
        self.attack_ms = clamp_or(ms, 0.05, 50.0, 0.5);
    }

    pub fn set_hold_ms(&mut self, ms: f64) {
        self.hold_ms = clamp_or(ms, 0.0, 500.0, 50.0);
    }

    pub fn set_release_ms(&mut self, ms: f64) {
        self.release_ms = clamp_or(ms, 5.0, 2000.0, 100.0);
    }

    pub fn set_range_db(&mut self, db: f64) {
        self.range_db = clamp_or(db, -90.0, 0.0, -80.0);
    }
}

impl Default for NoiseGateConfig {
    fn default() -> Self {
        Self {
            threshold_db: -50.0,
            hysteresis_db: 4.0,
            attack_ms: 0.5,
            hold_ms: 50.0,
            release_ms: 100.0,
            range_db: -80.0,
        }
    }
}

/// Derived per-sample constants
#[derive(Debug, Clone, Copy, Default)]
struct GateCoeffs {
    open_level: f64,
    close_level: f64,
    floor: f64,
    hold_samples: usize,
    attack: f64,
    release: f64,
}

pub struct NoiseGate {
    config: NoiseGateConfig,
    detector: EnvelopeDetector,
    coeffs: GateCoeffs,
    coeff_gate: ParameterGate<(NoiseGateConfig, u64)>,
    sample_rate: f64,
    state: GateState,
    hold_remaining: usize,
    gain: f64,
}

impl NoiseGate {
    pub fn new() -> Self {
        let sample_rate = ProcessSpec::default().sample_rate;
        let mut gate = Self {
            config: NoiseGateConfig::default(),
            detector: EnvelopeDetector::with_config(
                sample_rate,
                DetectorMode::Peak,
                EnvelopePolicy::InstantAttack,
                0.0,
                DETECTOR_RELEASE_MS,
            ),
            coeffs: GateCoeffs::default(),
            coeff_gate: ParameterGate::new(),
            sample_rate,
            state: GateState::Closed,
            hold_remaining: 0,
            gain: 0.0,
        };
        gate.update_coeffs();
        gate.gain = gate.coeffs.floor;
        gate
    }

    pub fn config(&self) -> &NoiseGateConfig {
        &self.config
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Current applied gain (linear)
    pub fn gain(&self) -> f64 {
        self.gain
    }

    fn update_coeffs(&mut self) {
        let config = self.config;
        let sample_rate = self.sample_rate;
        let key = (config, sample_rate.to_bits());
        let coeffs = &mut self.coeffs;
        self.coeff_gate.update(key, |_| {
            *coeffs = GateCoeffs {
                open_level: db_to_gain(config.threshold_db),
                close_level: db_to_gain(config.threshold_db - config.hysteresis_db),
                floor: db_to_gain(config.range_db),
                hold_samples: (config.hold_ms * 0.001 * sample_rate).round() as usize,
                attack: time_constant_coeff(config.attack_ms, sample_rate),
                release: time_constant_coeff(config.release_ms, sample_rate),
            };
        });
    }

    #[inline]
    fn advance_state(&mut self, level: f64) {
        let c = &self.coeffs;
        self.state = match self.state {
            GateState::Closed if level >= c.open_level => GateState::Open,
            GateState::Closed => GateState::Closed,
            GateState::Open if level < c.close_level => {
                self.hold_remaining = c.hold_samples;
                GateState::Hold
            }
            GateState::Open => GateState::Open,
            GateState::Hold if level >= c.open_level => GateState::Open,
            GateState::Hold if self.hold_remaining == 0 => GateState::Closed,
            GateState::Hold => {
                self.hold_remaining -= 1;
                GateState::Hold
            }
        };
    }
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for NoiseGate {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.detector.set_sample_rate(spec.sample_rate);
        self.update_coeffs();
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_THRESHOLD => self.config.set_threshold_db(value),
            PARAM_HYSTERESIS => self.config.set_hysteresis_db(value),
            PARAM_ATTACK => self.config.set_attack_ms(value),
            PARAM_HOLD => self.config.set_hold_ms(value),
            PARAM_RELEASE => self.config.set_release_ms(value),
            PARAM_RANGE => self.config.set_range_db(value),
            _ => return,
        }
        self.update_coeffs();
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let level = self.detector.process_stereo(*l, *r);
            self.advance_state(level);

            let target = match self.state {
                GateState::Open | GateState::Hold => 1.0,
                GateState::Closed => self.coeffs.floor,
            };
            let coeff = if target > self.gain {
                self.coeffs.attack
            } else {
                self.coeffs.release
            };
            self.gain = target + coeff * (self.gain - target);

            *l *= self.gain;
            *r *= self.gain;
        }
    }

    fn reset(&mut self) {
        self.detector.reset();
        self.state = GateState::Closed;
        self.hold_remaining = 0;
        self.gain = self.coeffs.floor;
    }
}
