//! Parameter smoothing
//!
//! Parameters reach the audio thread once per block; a `SmoothedParam`
//! spreads each jump over a short ramp so gain, mix and delay-time changes
//! never click or zipper.

use serde::{Deserialize, Serialize};

// ============ Smoothing Algorithms ============

/// Smoothing algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmoothingType {
    /// Linear ramp reaching the target in exactly the smoothing time
    #[default]
    Linear,
    /// One-pole (RC style), 63 % of the way after the smoothing time
    Exponential,
    /// Instant change
    None,
}

// ============ Smoothed Parameter ============

/// Audio-thread parameter ramp
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    target: f64,
    current: f64,
    smoothing_type: SmoothingType,
    smoothing_ms: f64,
    smoothing_samples: f64,
    coeff: f64,
    linear_step: f64,
    linear_remaining: u32,
    sample_rate: f64,
}

impl SmoothedParam {
    pub fn new(
        initial_value: f64,
        smoothing_time_ms: f64,
        sample_rate: f64,
        smoothing_type: SmoothingType,
    ) -> Self {
        let mut param = Self {
            target: initial_value,
            current: initial_value,
            smoothing_type,
            smoothing_ms: 0.0,
            smoothing_samples: 0.0,
            coeff: 1.0,
            linear_step: 0.0,
            linear_remaining: 0,
            sample_rate,
        };
        param.set_smoothing_time(smoothing_time_ms);
        param
    }

    /// Linear ramp of `smoothing_time_ms`
    pub fn linear(initial_value: f64, smoothing_time_ms: f64, sample_rate: f64) -> Self {
        Self::new(initial_value, smoothing_time_ms, sample_rate, SmoothingType::Linear)
    }

    fn calculate_coeff(samples: f64) -> f64 {
        if samples <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / samples).exp()
        }
    }

    pub fn set_smoothing_time(&mut self, time_ms: f64) {
        self.smoothing_ms = if time_ms.is_finite() { time_ms.max(0.0) } else { 0.0 };
        self.smoothing_samples = self.smoothing_ms * 0.001 * self.sample_rate;
        self.coeff = Self::calculate_coeff(self.smoothing_samples);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.set_smoothing_time(self.smoothing_ms);
    }

    /// New destination; the ramp starts from the current value.
    #[inline]
    pub fn set_target(&mut self, value: f64) {
        if !value.is_finite() || value == self.target {
            return;
        }
        self.target = value;
        if self.smoothing_type == SmoothingType::Linear {
            let steps = self.smoothing_samples.round() as u32;
            if steps == 0 {
                self.current = value;
                self.linear_remaining = 0;
            } else {
                self.linear_step = (value - self.current) / steps as f64;
                self.linear_remaining = steps;
            }
        }
    }

    /// Jump straight to `value` (prepare / reset)
    pub fn set_immediate(&mut self, value: f64) {
        if value.is_finite() {
            self.target = value;
            self.current = value;
            self.linear_remaining = 0;
        }
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        match self.smoothing_type {
            SmoothingType::None => false,
            SmoothingType::Linear => self.linear_remaining > 0,
            SmoothingType::Exponential => (self.current - self.target).abs() > 1e-10,
        }
    }

    /// Advance one sample and return the smoothed value
    #[inline]
    pub fn next(&mut self) -> f64 {
        match self.smoothing_type {
            SmoothingType::None => self.current = self.target,
            SmoothingType::Exponential => {
                self.current += self.coeff * (self.target - self.current);
                if (self.current - self.target).abs() <= 1e-10 {
                    self.current = self.target;
                }
            }
            SmoothingType::Linear => {
                if self.linear_remaining > 0 {
                    self.linear_remaining -= 1;
                    self.current = if self.linear_remaining == 0 {
                        self.target
                    } else {
                        self.current + self.linear_step
                    };
                }
            }
        }
        self.current
    }

    /// Snap to the target, dropping any ramp in progress
    pub fn reset(&mut self) {
        self.current = self.target;
        self.linear_remaining = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_reaches_target_exactly() {
        let mut p = SmoothedParam::linear(0.0, 10.0, 1000.0);
        p.set_target(1.0);
        let mut last = 0.0;
        for i in 0..10 {
            let v = p.next();
            assert!(v > last || i == 9);
            last = v;
        }
        assert_eq!(p.current(), 1.0);
        assert!(!p.is_smoothing());
        assert_eq!(p.next(), 1.0);
    }

    #[test]
    fn test_exponential_converges() {
        let mut p = SmoothedParam::new(0.0, 5.0, 48000.0, SmoothingType::Exponential);
        p.set_target(1.0);
        let after_tau = (0..240).map(|_| p.next()).last().unwrap();
        assert_relative_eq!(after_tau, 1.0 - (-1.0f64).exp(), epsilon = 1e-3);
        for _ in 0..48000 {
            p.next();
        }
        assert_eq!(p.current(), 1.0);
    }

    #[test]
    fn test_none_is_instant() {
        let mut p = SmoothedParam::new(0.0, 50.0, 48000.0, SmoothingType::None);
        p.set_target(0.3);
        assert_eq!(p.next(), 0.3);
    }

    #[test]
    fn test_retarget_mid_ramp_is_continuous() {
        let mut p = SmoothedParam::linear(0.0, 1.0, 1000.0);
        p.set_smoothing_time(100.0);
        p.set_target(1.0);
        for _ in 0..50 {
            p.next();
        }
        let mid = p.current();
        p.set_target(0.0);
        let step = (p.next() - mid).abs();
        assert!(step < 0.02);
    }

    #[test]
    fn test_non_finite_target_ignored() {
        let mut p = SmoothedParam::linear(0.5, 10.0, 48000.0);
        p.set_target(f64::NAN);
        assert_eq!(p.target(), 0.5);
    }
}
