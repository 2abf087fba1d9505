//! Neural amp model
//!
//! One LSTM inference state per channel over a shared, immutable
//! `LstmModel`. Models are swapped in while running through a
//! `NeuralAmpLoader`; without a model the effect passes the signal
//! through its input and output gains only.

use std::path::Path;
use std::sync::Arc;

use pf_core::{ParamId, ParamRange, ParamSpec, ProcessSpec, Sample, db_to_gain};
use pf_dsp::neural::{LstmAmp, LstmModel};
use pf_dsp::{MonoProcessor, Processor};
use pf_file::load_lstm_model;
use serde::{Deserialize, Serialize};

use super::{EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};
use crate::error::{EngineError, EngineResult};
use crate::handoff::{DEFAULT_RESOURCE_QUEUE, ResourceReceiver, ResourceSender, resource_channel};

pub const PARAM_INPUT: ParamId = ParamId(0);
pub const PARAM_OUTPUT: ParamId = ParamId(1);
pub const PARAM_CONDITION: ParamId = ParamId(2);
pub const PARAM_MIX: ParamId = ParamId(3);

static PARAMS: [ParamSpec; 4] = [
    ParamSpec::new(0, "input", "dB", ParamRange::linear(-24.0, 24.0, 0.0)),
    ParamSpec::new(1, "output", "dB", ParamRange::linear(-36.0, 12.0, 0.0)),
    ParamSpec::new(2, "condition", "", ParamRange::linear(0.0, 1.0, 0.5)),
    ParamSpec::new(3, "mix", "", ParamRange::linear(0.0, 1.0, 1.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Neural Amp",
    kind: EffectKind::NeuralAmp,
    params: &PARAMS,
    capabilities: Capabilities::NONE,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuralAmpConfig {
    pub input_db: f64,
    pub output_db: f64,
    /// Conditioning input for models trained with a gain knob
    pub condition: f64,
    pub mix: f64,
}

impl NeuralAmpConfig {
    pub fn set_input_db(&mut self, db: f64) {
        self.input_db = clamp_or(db, -24.0, 24.0, 0.0);
    }

    pub fn set_output_db(&mut self, db: f64) {
        self.output_db = clamp_or(db, -36.0, 12.0, 0.0);
    }

    pub fn set_condition(&mut self, value: f64) {
        self.condition = clamp_or(value, 0.0, 1.0, 0.5);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 1.0);
    }
}

impl Default for NeuralAmpConfig {
    fn default() -> Self {
        Self {
            input_db: 0.0,
            output_db: 0.0,
            condition: 0.5,
            mix: 1.0,
        }
    }
}

/// Per-channel inference state over one model
#[derive(Debug, Clone)]
pub struct StereoLstm {
    left: LstmAmp,
    right: LstmAmp,
}

impl StereoLstm {
    pub fn new(model: Arc<LstmModel>) -> Self {
        Self {
            left: LstmAmp::new(Arc::clone(&model)),
            right: LstmAmp::new(model),
        }
    }

    pub fn model(&self) -> &Arc<LstmModel> {
        self.left.model()
    }

    pub fn set_condition(&mut self, value: f64) {
        self.left.set_condition(0, value);
        self.right.set_condition(0, value);
    }

    #[inline]
    pub fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        (self.left.process_sample(left), self.right.process_sample(right))
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

/// Control-thread handle for swapping models into a running amp
pub struct NeuralAmpLoader {
    sender: ResourceSender<StereoLstm>,
}

impl NeuralAmpLoader {
    pub fn load(&mut self, model: Arc<LstmModel>) -> EngineResult<()> {
        log::info!(
            "Neural amp: queueing model '{}' (hidden {})",
            model.name(),
            model.hidden_size()
        );
        self.sender
            .send(Box::new(StereoLstm::new(model)))
            .map_err(|_| EngineError::QueueFull(self.sender.pending()))
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> EngineResult<()> {
        let model = load_lstm_model(path)?;
        self.load(model)
    }

    /// Drop models the audio thread has retired
    pub fn collect_garbage(&mut self) -> usize {
        self.sender.collect_garbage()
    }
}

pub struct NeuralAmp {
    config: NeuralAmpConfig,
    amp: Option<Box<StereoLstm>>,
    incoming: Option<ResourceReceiver<StereoLstm>>,
    input_gain: f64,
    output_gain: f64,
    sample_rate: f64,
}

impl NeuralAmp {
    pub fn new() -> Self {
        Self {
            config: NeuralAmpConfig::default(),
            amp: None,
            incoming: None,
            input_gain: 1.0,
            output_gain: 1.0,
            sample_rate: ProcessSpec::default().sample_rate,
        }
    }

    pub fn config(&self) -> &NeuralAmpConfig {
        &self.config
    }

    /// Install a model directly. Allocates: call only while the effect is
    /// not being processed.
    pub fn set_model(&mut self, model: Arc<LstmModel>) {
        self.check_rate(&model);
        let mut amp = StereoLstm::new(model);
        amp.set_condition(self.config.condition);
        self.amp = Some(Box::new(amp));
    }

    pub fn model(&self) -> Option<&Arc<LstmModel>> {
        self.amp.as_ref().map(|a| a.model())
    }

    /// Attach a loader for swapping models while processing. Replaces any
    /// earlier loader.
    pub fn loader(&mut self) -> NeuralAmpLoader {
        let (sender, receiver) = resource_channel(DEFAULT_RESOURCE_QUEUE);
        self.incoming = Some(receiver);
        NeuralAmpLoader { sender }
    }

    fn check_rate(&self, model: &LstmModel) {
        let trained = model.sample_rate();
        if trained > 0.0 && trained != self.sample_rate {
            log::warn!(
                "Neural model '{}' trained at {trained} Hz, running at {} Hz",
                model.name(),
                self.sample_rate
            );
        }
    }
}

impl Default for NeuralAmp {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for NeuralAmp {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        if let Some(incoming) = self.incoming.as_mut() {
            incoming.receive(&mut self.amp);
        }
        if let Some(amp) = self.amp.as_ref() {
            self.check_rate(amp.model());
        }
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_INPUT => {
                self.config.set_input_db(value);
                self.input_gain = db_to_gain(self.config.input_db);
            }
            PARAM_OUTPUT => {
                self.config.set_output_db(value);
                self.output_gain = db_to_gain(self.config.output_db);
            }
            PARAM_CONDITION => {
                self.config.set_condition(value);
                if let Some(amp) = self.amp.as_mut() {
                    amp.set_condition(self.config.condition);
                }
            }
            PARAM_MIX => self.config.set_mix(value),
            _ => {}
        }
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if let Some(incoming) = self.incoming.as_mut() {
            if incoming.receive(&mut self.amp) {
                if let Some(amp) = self.amp.as_mut() {
                    amp.set_condition(self.config.condition);
                }
            }
        }

        let (gain_in, gain_out, mix) = (self.input_gain, self.output_gain, self.config.mix);
        match self.amp.as_mut() {
            Some(amp) => {
                for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                    let (wet_l, wet_r) = amp.process_sample(*l * gain_in, *r * gain_in);
                    *l = blend(*l, wet_l * gain_out, mix);
                    *r = blend(*r, wet_r * gain_out, mix);
                }
            }
            None => {
                let gain = gain_in * gain_out;
                for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                    *l = blend(*l, *l * gain, mix);
                    *r = blend(*r, *r * gain, mix);
                }
            }
        }
    }

    fn reset(&mut self) {
        if let Some(amp) = self.amp.as_mut() {
            amp.reset();
        }
    }
}
