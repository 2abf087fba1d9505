//! Soft clipping and waveshaping
//!
//! `soft_clip` bounds every feedback loop in the engine; `Saturator` is the
//! drive stage of the overdrive.

use pf_core::Sample;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

use crate::{MonoProcessor, Processor};

/// Bounded, smooth, odd-symmetric limiter for feedback paths: `tanh(x)`.
#[inline(always)]
pub fn soft_clip(x: Sample) -> Sample {
    x.tanh()
}

#[inline(always)]
pub fn hard_clip(x: Sample) -> Sample {
    x.clamp(-1.0, 1.0)
}

/// Transfer curves, all mapping into `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipCurve {
    #[default]
    Tanh,
    Atan,
    /// `1.5x − 0.5x³` inside ±1, flat outside
    Cubic,
    /// Different knees per polarity (even harmonics)
    Asymmetric,
    Hard,
}

impl ClipCurve {
    pub const ALL: [ClipCurve; 5] = [
        ClipCurve::Tanh,
        ClipCurve::Atan,
        ClipCurve::Cubic,
        ClipCurve::Asymmetric,
        ClipCurve::Hard,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    #[inline]
    pub fn apply(self, x: Sample) -> Sample {
        match self {
            ClipCurve::Tanh => x.tanh(),
            ClipCurve::Atan => x.atan() / FRAC_PI_2,
            ClipCurve::Cubic => {
                let x = x.clamp(-1.0, 1.0);
                1.5 * x - 0.5 * x * x * x
            }
            ClipCurve::Asymmetric => {
                if x >= 0.0 {
                    1.0 - (-x * 1.5).exp()
                } else {
                    -(1.0 - (x * 3.0).exp())
                }
            }
            ClipCurve::Hard => hard_clip(x),
        }
    }
}

/// Drive → curve → output gain, with dry/wet mix
#[derive(Debug, Clone)]
pub struct Saturator {
    curve: ClipCurve,
    drive: f64,
    output_gain: f64,
    mix: f64,
}

impl Saturator {
    pub fn new() -> Self {
        Self {
            curve: ClipCurve::Tanh,
            drive: 1.0,
            output_gain: 1.0,
            mix: 1.0,
        }
    }

    pub fn set_curve(&mut self, curve: ClipCurve) {
        self.curve = curve;
    }

    /// Linear drive, clamped to [0.1, 1000]
    pub fn set_drive(&mut self, drive: f64) {
        self.drive = if drive.is_finite() { drive.clamp(0.1, 1000.0) } else { 1.0 };
    }

    pub fn set_drive_db(&mut self, db: f64) {
        self.set_drive(pf_core::db_to_gain(db));
    }

    pub fn set_output_db(&mut self, db: f64) {
        self.output_gain = pf_core::db_to_gain(db.clamp(-60.0, 24.0));
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = mix.clamp(0.0, 1.0);
    }
}

impl Default for Saturator {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Saturator {
    fn reset(&mut self) {}
}

impl MonoProcessor for Saturator {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let shaped = self.curve.apply(input * self.drive) * self.output_gain;
        input + self.mix * (shaped - input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curves_bounded() {
        for curve in ClipCurve::ALL {
            for i in -1000..=1000 {
                let x = i as f64 * 0.05;
                let y = curve.apply(x);
                assert!((-1.0..=1.0).contains(&y), "{curve:?}({x}) = {y}");
            }
            assert_eq!(curve.apply(0.0), 0.0);
        }
    }

    #[test]
    fn test_soft_clip_small_signal_linear() {
        assert!((soft_clip(0.001) - 0.001).abs() < 1e-9);
        assert!(soft_clip(100.0) <= 1.0);
    }

    #[test]
    fn test_dry_mix_passes_input() {
        let mut sat = Saturator::new();
        sat.set_drive_db(30.0);
        sat.set_mix(0.0);
        assert_eq!(sat.process_sample(0.7), 0.7);
    }
}
