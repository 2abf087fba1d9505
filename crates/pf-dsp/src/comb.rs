//! Reverb building blocks on top of `DelayLine`
//!
//! Both filters are two-phase: the output is computed from the previous
//! write, then the new state is written.

use pf_core::Sample;

use crate::delay_line::DelayLine;
use crate::saturation::soft_clip;
use crate::{MAX_FEEDBACK, flush_denormal};

/// Feedback comb with a one-pole lowpass in the loop
#[derive(Debug, Clone)]
pub struct DampedComb {
    line: DelayLine,
    delay: usize,
    feedback: f64,
    damp: f64,
    store: f64,
}

impl DampedComb {
    /// `delay` of at least one sample
    pub fn new(delay: usize) -> Self {
        let delay = delay.max(1);
        Self {
            line: DelayLine::with_max_delay(delay),
            delay,
            feedback: 0.5,
            damp: 0.2,
            store: 0.0,
        }
    }

    /// Clamped to `[0, MAX_FEEDBACK]`
    pub fn set_feedback(&mut self, feedback: f64) {
        self.feedback = feedback.clamp(0.0, MAX_FEEDBACK);
    }

    /// 0 = bright, 1 = fully damped
    pub fn set_damping(&mut self, damp: f64) {
        self.damp = damp.clamp(0.0, 0.99);
    }

    #[inline]
    pub fn delay(&self) -> usize {
        self.delay
    }

    #[inline]
    pub fn process(&mut self, input: Sample) -> Sample {
        let output = self.line.read_integer(self.delay - 1);
        self.store = flush_denormal(output * (1.0 - self.damp) + self.store * self.damp);
        self.line.write(soft_clip(input + self.store * self.feedback));
        output
    }

    pub fn clear(&mut self) {
        self.line.clear();
        self.store = 0.0;
    }
}

/// Schroeder all-pass: `H(z) = (−g + z^−D) / (1 − g·z^−D)`
#[derive(Debug, Clone)]
pub struct SchroederAllpass {
    line: DelayLine,
    delay: usize,
    gain: f64,
}

impl SchroederAllpass {
    pub fn new(delay: usize, gain: f64) -> Self {
        let delay = delay.max(1);
        Self {
            line: DelayLine::with_max_delay(delay),
            delay,
            gain: gain.clamp(-MAX_FEEDBACK, MAX_FEEDBACK),
        }
    }

    #[inline]
    pub fn process(&mut self, input: Sample) -> Sample {
        let delayed = self.line.read_integer(self.delay - 1);
        let v = flush_denormal(input + self.gain * delayed);
        self.line.write(v);
        delayed - self.gain * v
    }

    pub fn clear(&mut self) {
        self.line.clear();
    }
}
