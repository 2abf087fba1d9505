//! Cabinet simulation by IR convolution
//!
//! A `StereoConvolver` streaming at a fixed block size, so the reported
//! latency is exactly one block whether or not an IR is loaded. The dry
//! path is delayed by the same amount to keep the mix phase-aligned.
//!
//! IRs arrive two ways: `set_impulse_response` while the effect is not
//! running, or a `CabinetLoader` that partitions the IR on the control
//! thread and hands the finished kernel over a resource channel.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use pf_core::{ImpulseResponse, ParamId, ParamRange, ParamSpec, ProcessSpec, Sample, db_to_gain};
use pf_dsp::convolution::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, StereoConvolver};
use pf_dsp::{DelayLine, Processor, StereoProcessor};
use pf_file::{IrLibrary, IrLoadOptions, resample_impulse_response};
use serde::{Deserialize, Serialize};

use super::{EffectKind, blend, clamp_or};
use crate::effect::{Capabilities, Effect, EffectDescriptor};
use crate::error::{EngineError, EngineResult};
use crate::handoff::{DEFAULT_RESOURCE_QUEUE, ResourceReceiver, ResourceSender, resource_channel};

pub const PARAM_MIX: ParamId = ParamId(0);
pub const PARAM_LEVEL: ParamId = ParamId(1);

static PARAMS: [ParamSpec; 2] = [
    ParamSpec::new(0, "mix", "", ParamRange::linear(0.0, 1.0, 1.0)),
    ParamSpec::new(1, "level", "dB", ParamRange::linear(-24.0, 12.0, 0.0)),
];

static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
    name: "Cabinet",
    kind: EffectKind::Cabinet,
    params: &PARAMS,
    capabilities: Capabilities {
        needs_stereo_link: false,
        reports_latency: true,
        has_lookahead: false,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CabinetConfig {
    /// Convolution partition size, which is also the latency
    pub block_size: usize,
    pub mix: f64,
    pub level_db: f64,
}

impl CabinetConfig {
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = clamp_or(mix, 0.0, 1.0, 1.0);
    }

    pub fn set_level_db(&mut self, db: f64) {
        self.level_db = clamp_or(db, -24.0, 12.0, 0.0);
    }
}

impl Default for CabinetConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            mix: 1.0,
            level_db: 0.0,
        }
    }
}

/// A partitioned IR ready for the audio thread
struct CabinetKernel {
    /// The IR as supplied, before any rate conversion
    source: Option<Arc<ImpulseResponse>>,
    convolver: StereoConvolver,
}

impl CabinetKernel {
    fn empty(block_size: usize) -> Self {
        Self {
            source: None,
            convolver: StereoConvolver::new(block_size),
        }
    }

    /// Resample to `sample_rate` if needed and partition at `block_size`.
    fn build(
        source: Arc<ImpulseResponse>,
        block_size: usize,
        sample_rate: f64,
    ) -> EngineResult<Self> {
        if source.is_silent() {
            return Err(EngineError::Rejected("impulse response is silent".into()));
        }
        let convolver = if source.sample_rate() == sample_rate {
            StereoConvolver::with_ir(&source, block_size)
        } else {
            log::warn!(
                "Cabinet IR at {} Hz, engine at {sample_rate} Hz: resampling",
                source.sample_rate()
            );
            let converted = resample_impulse_response((*source).clone(), sample_rate)?;
            StereoConvolver::with_ir(&converted, block_size)
        };
        log::debug!(
            "Cabinet kernel: {} frames, block {block_size}",
            source.len()
        );
        Ok(Self {
            source: Some(source),
            convolver,
        })
    }
}

/// Rate and block size the loader must build for, updated by `prepare`
#[derive(Debug)]
struct KernelTarget {
    sample_rate_bits: AtomicU64,
    block_size: AtomicUsize,
}

impl KernelTarget {
    fn new(sample_rate: f64, block_size: usize) -> Self {
        Self {
            sample_rate_bits: AtomicU64::new(sample_rate.to_bits()),
            block_size: AtomicUsize::new(block_size),
        }
    }

    fn store(&self, sample_rate: f64, block_size: usize) {
        self.sample_rate_bits.store(sample_rate.to_bits(), Ordering::Release);
        self.block_size.store(block_size, Ordering::Release);
    }

    fn load(&self) -> (f64, usize) {
        (
            f64::from_bits(self.sample_rate_bits.load(Ordering::Acquire)),
            self.block_size.load(Ordering::Acquire),
        )
    }
}

/// Control-thread handle that swaps IRs into a running cabinet
pub struct CabinetLoader {
    sender: ResourceSender<CabinetKernel>,
    target: Arc<KernelTarget>,
}

impl CabinetLoader {
    /// Partition `ir` and queue it. Blocks only on the FFT planning and
    /// partitioning, never on the audio thread.
    pub fn load(&mut self, ir: Arc<ImpulseResponse>) -> EngineResult<()> {
        let (sample_rate, block_size) = self.target.load();
        let kernel = CabinetKernel::build(ir, block_size, sample_rate)?;
        self.send(kernel)
    }

    /// Load through a shared library so identical files share one IR
    pub fn load_file<P: AsRef<Path>>(&mut self, library: &IrLibrary, path: P) -> EngineResult<()> {
        let (sample_rate, _) = self.target.load();
        let ir = library.load(path, &IrLoadOptions::new(sample_rate))?;
        self.load(ir)
    }

    /// Return the cabinet to its dry (delayed) passthrough
    pub fn unload(&mut self) -> EngineResult<()> {
        let (_, block_size) = self.target.load();
        self.send(CabinetKernel::empty(block_size))
    }

    /// Drop kernels the audio thread has retired
    pub fn collect_garbage(&mut self) -> usize {
        self.sender.collect_garbage()
    }

    fn send(&mut self, kernel: CabinetKernel) -> EngineResult<()> {
        self.sender
            .send(Box::new(kernel))
            .map_err(|_| EngineError::QueueFull(self.sender.pending()))
    }
}

pub struct Cabinet {
    config: CabinetConfig,
    kernel: Option<Box<CabinetKernel>>,
    incoming: Option<ResourceReceiver<CabinetKernel>>,
    target: Arc<KernelTarget>,
    dry: [DelayLine; 2],
    level: f64,
    sample_rate: f64,
}

impl Cabinet {
    pub fn new() -> Self {
        Self::with_config(CabinetConfig::default())
    }

    pub fn with_config(mut config: CabinetConfig) -> Self {
        config.set_block_size(config.block_size);
        let sample_rate = ProcessSpec::default().sample_rate;
        Self {
            config,
            kernel: Some(Box::new(CabinetKernel::empty(config.block_size))),
            incoming: None,
            target: Arc::new(KernelTarget::new(sample_rate, config.block_size)),
            dry: [
                DelayLine::with_max_delay(config.block_size),
                DelayLine::with_max_delay(config.block_size),
            ],
            level: db_to_gain(config.level_db),
            sample_rate,
        }
    }

    pub fn config(&self) -> &CabinetConfig {
        &self.config
    }

    /// Install an IR directly. Allocates: call only while the effect is
    /// not being processed.
    pub fn set_impulse_response(&mut self, ir: Arc<ImpulseResponse>) -> EngineResult<()> {
        let kernel = CabinetKernel::build(ir, self.config.block_size, self.sample_rate)?;
        self.kernel = Some(Box::new(kernel));
        Ok(())
    }

    pub fn impulse_response(&self) -> Option<&Arc<ImpulseResponse>> {
        self.kernel.as_ref().and_then(|k| k.source.as_ref())
    }

    pub fn is_loaded(&self) -> bool {
        self.kernel.as_ref().is_some_and(|k| k.convolver.is_loaded())
    }

    /// Attach a loader for hot-swapping IRs while processing. Replaces any
    /// earlier loader.
    pub fn loader(&mut self) -> CabinetLoader {
        let (sender, receiver) = resource_channel(DEFAULT_RESOURCE_QUEUE);
        self.incoming = Some(receiver);
        CabinetLoader {
            sender,
            target: Arc::clone(&self.target),
        }
    }
}

impl Default for Cabinet {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Cabinet {
    fn descriptor(&self) -> &'static EffectDescriptor {
        &DESCRIPTOR
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        // Pick up anything queued so the rebuild starts from the newest IR
        if let Some(incoming) = self.incoming.as_mut() {
            incoming.receive(&mut self.kernel);
        }

        self.sample_rate = spec.sample_rate;
        let block_size = self.config.block_size;
        self.target.store(spec.sample_rate, block_size);

        let source = self.kernel.as_ref().and_then(|k| k.source.clone());
        let kernel = match source {
            Some(ir) => CabinetKernel::build(ir, block_size, spec.sample_rate).unwrap_or_else(|e| {
                log::warn!("Cabinet IR unusable at {} Hz, running dry: {e}", spec.sample_rate);
                CabinetKernel::empty(block_size)
            }),
            None => CabinetKernel::empty(block_size),
        };
        self.kernel = Some(Box::new(kernel));
        self.dry = [
            DelayLine::with_max_delay(block_size),
            DelayLine::with_max_delay(block_size),
        ];
        self.reset();
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        match id {
            PARAM_MIX => self.config.set_mix(value),
            PARAM_LEVEL => {
                self.config.set_level_db(value);
                self.level = db_to_gain(self.config.level_db);
            }
            _ => {}
        }
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if let Some(incoming) = self.incoming.as_mut() {
            incoming.receive(&mut self.kernel);
        }
        let Some(kernel) = self.kernel.as_mut() else {
            return;
        };

        let latency = self.config.block_size;
        let mix = self.config.mix;
        let level = self.level;
        let [dry_l, dry_r] = &mut self.dry;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            dry_l.write(*l);
            dry_r.write(*r);
            let (wet_l, wet_r) = kernel.convolver.process_sample(*l, *r);
            *l = blend(dry_l.read_integer(latency), wet_l * level, mix);
            *r = blend(dry_r.read_integer(latency), wet_r * level, mix);
        }
    }

    fn reset(&mut self) {
        if let Some(kernel) = self.kernel.as_mut() {
            kernel.convolver.reset();
        }
        for line in &mut self.dry {
            line.clear();
        }
    }

    fn latency_samples(&self) -> usize {
        self.config.block_size
    }
}
