//! Effect runtime: lifecycle, parameter delivery and fault handling
//!
//! Wraps one boxed effect and drives it the way a host callback would:
//!
//! - `Idle → Active` on the first non-silent input or an explicit
//!   `trigger()`; `Active → Idle` on `reset()` or bypass. An idle effect is
//!   not run, so silence in means silence out at no cost.
//! - Parameter snapshots are applied once per host block and only the ids
//!   that changed are forwarded to the effect.
//! - Host blocks longer than the prepared maximum are split.
//! - A block that comes out non-finite resets the effect and is replaced
//!   by the dry input, delayed by the reported latency; the fault is
//!   counted, never logged.
//! - Bypass delays the dry path by the effect's latency so the reported
//!   latency never changes.

use pf_core::{ParamId, ParamMap, ProcessSpec, Sample, all_finite};
use pf_dsp::DelayLine;

use crate::effect::{Effect, EffectDescriptor};
use crate::handoff::ParamReceiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Idle,
    Active,
}

pub struct EffectRuntime {
    effect: Box<dyn Effect>,
    params: ParamMap,
    receiver: Option<ParamReceiver>,
    spec: ProcessSpec,
    prepared: bool,
    state: RuntimeState,
    bypassed: bool,
    latency: usize,
    bypass_left: DelayLine,
    bypass_right: DelayLine,
    dry_left: Vec<Sample>,
    dry_right: Vec<Sample>,
    faults: u64,
}

impl EffectRuntime {
    pub fn new(effect: Box<dyn Effect>) -> Self {
        let params = ParamMap::new(effect.descriptor().params);
        Self {
            effect,
            params,
            receiver: None,
            spec: ProcessSpec::default(),
            prepared: false,
            state: RuntimeState::Idle,
            bypassed: false,
            latency: 0,
            bypass_left: DelayLine::with_max_delay(0),
            bypass_right: DelayLine::with_max_delay(0),
            dry_left: Vec::new(),
            dry_right: Vec::new(),
            faults: 0,
        }
    }

    /// Take parameter snapshots from a control thread
    pub fn with_receiver(mut self, receiver: ParamReceiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn descriptor(&self) -> &'static EffectDescriptor {
        self.effect.descriptor()
    }

    /// Allocate everything for `spec`. Not real-time safe.
    pub fn prepare(&mut self, spec: ProcessSpec) {
        self.spec = spec;
        self.effect.prepare(&spec);
        self.latency = self.effect.latency_samples();

        self.bypass_left = DelayLine::with_max_delay(self.latency);
        self.bypass_right = DelayLine::with_max_delay(self.latency);
        self.dry_left = vec![0.0; spec.max_block_size];
        self.dry_right = vec![0.0; spec.max_block_size];

        self.params.mark_all_changed();
        self.forward_changed();
        self.state = RuntimeState::Idle;
        self.prepared = true;

        log::debug!(
            "Prepared {} at {} Hz, block {}, latency {}",
            self.effect.name(),
            spec.sample_rate,
            spec.max_block_size,
            self.latency
        );
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Force `Active` (e.g. a looper armed on silence)
    pub fn trigger(&mut self) {
        if !self.bypassed {
            self.state = RuntimeState::Active;
        }
    }

    /// Direct parameter change, delivered at the start of the next block
    pub fn set_param(&mut self, id: ParamId, value: f64) -> bool {
        self.params.set(id, value)
    }

    pub fn set_param_by_name(&mut self, name: &str, value: f64) -> bool {
        match self.params.id_of(name) {
            Some(id) => self.set_param(id, value),
            None => false,
        }
    }

    pub fn param(&self, id: ParamId) -> f64 {
        self.params.get(id)
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        if bypass == self.bypassed {
            return;
        }
        self.bypassed = bypass;
        self.effect.reset();
        self.bypass_left.clear();
        self.bypass_right.clear();
        self.state = RuntimeState::Idle;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Stable for the lifetime of a `prepare`, bypassed or not
    pub fn latency_samples(&self) -> usize {
        self.latency
    }

    /// Blocks replaced by dry signal after a non-finite result
    pub fn fault_count(&self) -> u64 {
        self.faults
    }

    /// Clear signal state; parameters are kept
    pub fn reset(&mut self) {
        self.effect.reset();
        self.bypass_left.clear();
        self.bypass_right.clear();
        self.state = RuntimeState::Idle;
    }

    pub fn effect(&self) -> &dyn Effect {
        self.effect.as_ref()
    }

    pub fn effect_mut(&mut self) -> &mut dyn Effect {
        self.effect.as_mut()
    }

    fn forward_changed(&mut self) {
        for id in self.params.take_changed() {
            self.effect.set_param(id, self.params.get(id));
        }
    }

    #[inline]
    fn begin_block(&mut self) {
        if let Some(snapshot) = self.receiver.as_mut().and_then(ParamReceiver::latest) {
            self.params.apply_snapshot(&snapshot);
        }
        if self.params.has_changes() {
            self.forward_changed();
        }
    }

    #[inline]
    fn wake_on(&mut self, left: &[Sample], right: &[Sample]) {
        if self.state == RuntimeState::Idle
            && left.iter().chain(right).any(|&s| s != 0.0)
        {
            self.state = RuntimeState::Active;
        }
    }

    /// Stereo in place
    pub fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if !self.prepared {
            return;
        }
        self.begin_block();

        let len = left.len().min(right.len());
        let max = self.spec.max_block_size;
        let mut start = 0;
        while start < len {
            let end = (start + max).min(len);
            self.process_chunk(&mut left[start..end], &mut right[start..end]);
            start = end;
        }
    }

    fn process_chunk(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if self.bypassed {
            delay_in_place(&mut self.bypass_left, self.latency, left);
            delay_in_place(&mut self.bypass_right, self.latency, right);
            return;
        }

        self.wake_on(left, right);
        if self.state == RuntimeState::Idle {
            feed(&mut self.bypass_left, left);
            feed(&mut self.bypass_right, right);
            return;
        }

        // Dry copies delayed by the latency, so a fault keeps alignment
        let n = left.len();
        self.dry_left[..n].copy_from_slice(left);
        self.dry_right[..n].copy_from_slice(right);
        delay_in_place(&mut self.bypass_left, self.latency, &mut self.dry_left[..n]);
        delay_in_place(&mut self.bypass_right, self.latency, &mut self.dry_right[..n]);

        self.effect.process_stereo(left, right);

        if !(all_finite(left) && all_finite(right)) {
            self.effect.reset();
            left.copy_from_slice(&self.dry_left[..n]);
            right.copy_from_slice(&self.dry_right[..n]);
            self.faults += 1;
            self.state = RuntimeState::Idle;
        }
    }

    /// Mono in place through the effect's mono path
    pub fn process(&mut self, buffer: &mut [Sample]) {
        if !self.prepared {
            return;
        }
        self.begin_block();

        let max = self.spec.max_block_size;
        for chunk in buffer.chunks_mut(max) {
            self.process_mono_chunk(chunk);
        }
    }

    fn process_mono_chunk(&mut self, buffer: &mut [Sample]) {
        if self.bypassed {
            delay_in_place(&mut self.bypass_left, self.latency, buffer);
            return;
        }

        self.wake_on(buffer, &[]);
        if self.state == RuntimeState::Idle {
            feed(&mut self.bypass_left, buffer);
            return;
        }

        let n = buffer.len();
        self.dry_left[..n].copy_from_slice(buffer);
        delay_in_place(&mut self.bypass_left, self.latency, &mut self.dry_left[..n]);
        self.effect.process(buffer);

        if !all_finite(buffer) {
            self.effect.reset();
            buffer.copy_from_slice(&self.dry_left[..n]);
            self.faults += 1;
            self.state = RuntimeState::Idle;
        }
    }
}

#[inline]
fn feed(line: &mut DelayLine, buffer: &[Sample]) {
    for &s in buffer {
        line.write(s);
    }
}

#[inline]
fn delay_in_place(line: &mut DelayLine, delay: usize, buffer: &mut [Sample]) {
    for s in buffer.iter_mut() {
        line.write(*s);
        *s = line.read_integer(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Capabilities;
    use crate::effects::EffectKind;
    use pf_core::{ParamRange, ParamSpec};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    static PARAMS: [ParamSpec; 1] = [ParamSpec::new(
        0,
        "gain",
        "",
        ParamRange::linear(0.0, 4.0, 1.0),
    )];

    static DESCRIPTOR: EffectDescriptor = EffectDescriptor {
        name: "Test Gain",
        kind: EffectKind::Filter,
        params: &PARAMS,
        capabilities: Capabilities::NONE,
    };

    #[derive(Default)]
    struct GainCounters {
        set_calls: AtomicUsize,
        blocks: AtomicUsize,
        poison: AtomicBool,
    }

    /// Gain stage that counts calls and can be told to blow up
    struct TestGain {
        gain: f64,
        latency: usize,
        counters: Arc<GainCounters>,
    }

    impl Effect for TestGain {
        fn descriptor(&self) -> &'static EffectDescriptor {
            &DESCRIPTOR
        }

        fn prepare(&mut self, _spec: &ProcessSpec) {}

        fn set_param(&mut self, _id: ParamId, value: f64) {
            self.gain = value;
            self.counters.set_calls.fetch_add(1, Ordering::Relaxed);
        }

        fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
            self.counters.blocks.fetch_add(1, Ordering::Relaxed);
            let poison = self.counters.poison.load(Ordering::Relaxed);
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *l *= self.gain;
                *r *= self.gain;
                if poison {
                    *l = f64::NAN;
                }
            }
        }

        fn reset(&mut self) {
            self.counters.poison.store(false, Ordering::Relaxed);
        }

        fn latency_samples(&self) -> usize {
            self.latency
        }
    }

    fn gain_runtime() -> (EffectRuntime, Arc<GainCounters>) {
        gain_runtime_with_latency(0)
    }

    fn gain_runtime_with_latency(latency: usize) -> (EffectRuntime, Arc<GainCounters>) {
        let counters = Arc::new(GainCounters::default());
        let effect = TestGain {
            gain: 1.0,
            latency,
            counters: Arc::clone(&counters),
        };
        let mut runtime = EffectRuntime::new(Box::new(effect));
        runtime.prepare(ProcessSpec::new(48000.0, 16));
        (runtime, counters)
    }

    fn count(c: &AtomicUsize) -> usize {
        c.load(Ordering::Relaxed)
    }

    #[test]
    fn test_idle_until_signal() {
        let (mut runtime, counters) = gain_runtime();
        let mut l = [0.0; 8];
        let mut r = [0.0; 8];
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(runtime.state(), RuntimeState::Idle);
        assert_eq!(count(&counters.blocks), 0);

        l[3] = 0.1;
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(runtime.state(), RuntimeState::Active);
        assert_eq!(count(&counters.blocks), 1);

        runtime.reset();
        assert_eq!(runtime.state(), RuntimeState::Idle);
        runtime.trigger();
        assert_eq!(runtime.state(), RuntimeState::Active);
    }

    #[test]
    fn test_only_changed_params_forwarded() {
        let (mut runtime, counters) = gain_runtime();
        assert_eq!(count(&counters.set_calls), 1);

        let mut l = [1.0; 4];
        let mut r = [1.0; 4];
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(count(&counters.set_calls), 1);

        assert!(runtime.set_param(ParamId(0), 2.0));
        assert!(!runtime.set_param(ParamId(0), 2.0));
        let mut l = [1.0; 4];
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(count(&counters.set_calls), 2);
        assert_eq!(l, [2.0; 4]);

        // Clamped to the declared range
        runtime.set_param_by_name("gain", 100.0);
        assert_eq!(runtime.param(ParamId(0)), 4.0);
    }

    #[test]
    fn test_large_blocks_are_split() {
        let (mut runtime, counters) = gain_runtime();
        let mut l = vec![1.0; 100];
        let mut r = vec![1.0; 100];
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(count(&counters.blocks), 7);
    }

    #[test]
    fn test_fault_guard_outputs_dry() {
        let (mut runtime, counters) = gain_runtime();
        runtime.set_param(ParamId(0), 2.0);
        counters.poison.store(true, Ordering::Relaxed);

        let mut l = [0.5; 8];
        let mut r = [0.25; 8];
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(l, [0.5; 8]);
        assert_eq!(r, [0.25; 8]);
        assert_eq!(runtime.fault_count(), 1);
        assert_eq!(runtime.state(), RuntimeState::Idle);

        // Reset cleared the poison; processing resumes
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(l, [1.0; 8]);
        assert_eq!(runtime.fault_count(), 1);
    }

    #[test]
    fn test_fault_dry_is_delayed_by_latency() {
        let (mut runtime, counters) = gain_runtime_with_latency(5);
        assert_eq!(runtime.latency_samples(), 5);

        let first: Vec<f64> = (1..=16).map(f64::from).collect();
        let mut l = first.clone();
        let mut r = first.clone();
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(runtime.fault_count(), 0);

        counters.poison.store(true, Ordering::Relaxed);
        let second: Vec<f64> = (17..=32).map(f64::from).collect();
        let mut l = second.clone();
        let mut r = second.clone();
        runtime.process_stereo(&mut l, &mut r);
        assert_eq!(runtime.fault_count(), 1);

        let expected: Vec<f64> = (12..=27).map(f64::from).collect();
        assert_eq!(l, expected);
        assert_eq!(r, expected);
    }

    #[test]
    fn test_mono_fault_dry_is_delayed_by_latency() {
        let (mut runtime, counters) = gain_runtime_with_latency(3);
        let mut buffer: Vec<f64> = (1..=8).map(f64::from).collect();
        runtime.process(&mut buffer);

        counters.poison.store(true, Ordering::Relaxed);
        let mut buffer: Vec<f64> = (9..=16).map(f64::from).collect();
        runtime.process(&mut buffer);
        assert_eq!(runtime.fault_count(), 1);
        let expected: Vec<f64> = (6..=13).map(f64::from).collect();
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_bypass_is_dry_and_idle() {
        let (mut runtime, counters) = gain_runtime();
        runtime.set_param(ParamId(0), 3.0);
        runtime.set_bypass(true);

        let mut buffer = [0.2; 8];
        runtime.process(&mut buffer);
        assert_eq!(buffer, [0.2; 8]);
        assert_eq!(count(&counters.blocks), 0);
        assert_eq!(runtime.state(), RuntimeState::Idle);
    }

    #[test]
    fn test_unprepared_passes_through() {
        let counters = Arc::new(GainCounters::default());
        let mut runtime = EffectRuntime::new(Box::new(TestGain {
            gain: 2.0,
            latency: 0,
            counters,
        }));
        let mut buffer = [0.3; 4];
        runtime.process(&mut buffer);
        assert_eq!(buffer, [0.3; 4]);
        assert!(!runtime.is_prepared());
    }
}
