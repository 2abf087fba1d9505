//! pf-engine: effects and the real-time runtime for PedalForge
//!
//! ## Modules
//! - `effect` - the `Effect` trait, descriptors and capability flags
//! - `effects` - the closed set of effects and `create_effect`
//! - `runtime` - `EffectRuntime` lifecycle, parameter delivery, fault guard
//! - `handoff` - lock-free parameter snapshots and resource swaps (rtrb)
//!
//! The audio thread only ever calls `EffectRuntime::process*`. Everything
//! that allocates, loads or logs happens in `prepare` or on the control
//! side of a handoff channel.

mod error;
pub mod effect;
pub mod effects;
pub mod handoff;
pub mod runtime;

pub use effect::{Capabilities, Effect, EffectDescriptor};
pub use effects::{EffectKind, create_effect};
pub use error::*;
pub use handoff::{
    ParamPublisher, ParamReceiver, ResourceReceiver, ResourceSender, param_channel,
    resource_channel,
};
pub use runtime::{EffectRuntime, RuntimeState};
