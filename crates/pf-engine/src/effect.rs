//! The effect contract
//!
//! Every effect is a stereo processor with a static descriptor. The
//! runtime owns the lifecycle; effects only see `prepare`, clamped
//! parameter values and audio.

use pf_core::{ParamId, ParamSpec, ProcessSpec, Sample};
use serde::Serialize;

use crate::effects::EffectKind;

/// Frames per stack chunk in the default mono path
const MONO_CHUNK: usize = 64;

/// What the runtime and host need to know about an effect's behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Detection is shared between channels
    pub needs_stereo_link: bool,
    /// `latency_samples()` can be non-zero
    pub reports_latency: bool,
    /// Looks ahead of the output (latency is the lookahead)
    pub has_lookahead: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        needs_stereo_link: false,
        reports_latency: false,
        has_lookahead: false,
    };

    pub const STEREO_LINKED: Self = Self {
        needs_stereo_link: true,
        ..Self::NONE
    };
}

/// Static description of an effect type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectDescriptor {
    pub name: &'static str,
    pub kind: EffectKind,
    pub params: &'static [ParamSpec],
    pub capabilities: Capabilities,
}

impl EffectDescriptor {
    pub fn param(&self, name: &str) -> Option<ParamId> {
        self.params.iter().find(|p| p.name == name).map(|p| p.id)
    }
}

/// Real-time effect
///
/// `process*` must not allocate, lock, log or block. Buffers are sized in
/// `prepare`, which may be called again whenever the rate or block size
/// changes.
pub trait Effect: Send {
    fn descriptor(&self) -> &'static EffectDescriptor;

    /// Size all state for `spec` and clear it
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Apply one parameter. Values arrive clamped to the declared range but
    /// effects clamp again in their config setters.
    fn set_param(&mut self, id: ParamId, value: f64);

    /// Process one block in place. `left.len() == right.len()` and never
    /// more than the prepared maximum block size.
    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]);

    /// Mono in place: the stereo path fed `(x, x)`, folded back to mid.
    fn process(&mut self, buffer: &mut [Sample]) {
        let mut left = [0.0; MONO_CHUNK];
        let mut right = [0.0; MONO_CHUNK];
        for chunk in buffer.chunks_mut(MONO_CHUNK) {
            let n = chunk.len();
            left[..n].copy_from_slice(chunk);
            right[..n].copy_from_slice(chunk);
            self.process_stereo(&mut left[..n], &mut right[..n]);
            for ((out, &l), &r) in chunk.iter_mut().zip(&left[..n]).zip(&right[..n]) {
                *out = 0.5 * (l + r);
            }
        }
    }

    /// Clear all signal state, keeping configuration
    fn reset(&mut self);

    fn latency_samples(&self) -> usize {
        0
    }

    fn name(&self) -> &'static str {
        self.descriptor().name
    }
}
