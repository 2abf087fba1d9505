//! Circular fractional delay buffer
//!
//! Capacity is `max_delay + 3` so a cubic read at the maximum delay still
//! has its two outer neighbours. Delays are measured in writes: delay 0 is
//! the most recent `write`. Callers choose the ordering: write-then-read
//! gives `y[n] = x[n - d]`, read-then-write (feedback loops) reads the
//! previous write and so adds one sample.

use pf_core::Sample;
use serde::{Deserialize, Serialize};

/// Extra slots beyond the maximum delay (cubic neighbours + write head)
const GUARD_SAMPLES: usize = 3;

/// Fractional read mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    /// 4-point Catmull-Rom (cubic Hermite)
    Cubic,
}

/// Fixed-capacity circular delay line
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<Sample>,
    write_pos: usize,
    max_delay: usize,
}

impl DelayLine {
    /// Allocates room for delays up to `max_delay` samples.
    pub fn with_max_delay(max_delay: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay + GUARD_SAMPLES],
            write_pos: 0,
            max_delay,
        }
    }

    /// Sized for `max_ms` at `sample_rate`.
    pub fn with_max_time(max_ms: f64, sample_rate: f64) -> Self {
        let samples = (max_ms.max(0.0) * 0.001 * sample_rate).ceil() as usize;
        Self::with_max_delay(samples)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Largest delay a read honours; longer requests are clamped to it.
    #[inline]
    pub fn max_delay(&self) -> usize {
        self.max_delay
    }

    #[inline]
    pub fn write(&mut self, sample: Sample) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// Sample written `k` writes ago. `k` must be below capacity.
    #[inline(always)]
    fn at(&self, k: usize) -> Sample {
        let len = self.buffer.len();
        let back = k + 1;
        let idx = if back <= self.write_pos {
            self.write_pos - back
        } else {
            self.write_pos + len - back
        };
        self.buffer[idx]
    }

    #[inline]
    fn clamp_delay(&self, delay: f64) -> f64 {
        if delay.is_nan() {
            0.0
        } else {
            delay.clamp(0.0, self.max_delay as f64)
        }
    }

    /// Integer tap (clamped)
    #[inline]
    pub fn read_integer(&self, delay: usize) -> Sample {
        self.at(delay.min(self.max_delay))
    }

    /// 2-point linear interpolation
    #[inline]
    pub fn read_linear(&self, delay: f64) -> Sample {
        let delay = self.clamp_delay(delay);
        let i = delay as usize;
        let frac = delay - i as f64;

        let x0 = self.at(i);
        if frac == 0.0 {
            return x0;
        }
        let x1 = self.at(i + 1);
        x0 + frac * (x1 - x0)
    }

    /// 4-point cubic Hermite (Catmull-Rom). Exact at integer delays.
    #[inline]
    pub fn read_cubic(&self, delay: f64) -> Sample {
        let delay = self.clamp_delay(delay);
        let i = delay as usize;
        let frac = delay - i as f64;

        let x0 = self.at(i);
        if frac == 0.0 {
            return x0;
        }
        // Newer neighbour does not exist below one sample: replicate the edge.
        let xm1 = if i == 0 { x0 } else { self.at(i - 1) };
        let x1 = self.at(i + 1);
        let x2 = self.at(i + 2);

        let c0 = x0;
        let c1 = 0.5 * (x1 - xm1);
        let c2 = xm1 - 2.5 * x0 + 2.0 * x1 - 0.5 * x2;
        let c3 = 0.5 * (x2 - xm1) + 1.5 * (x0 - x1);

        ((c3 * frac + c2) * frac + c1) * frac + c0
    }

    #[inline]
    pub fn read(&self, delay: f64, mode: Interpolation) -> Sample {
        match mode {
            Interpolation::Linear => self.read_linear(delay),
            Interpolation::Cubic => self.read_cubic(delay),
        }
    }

    /// Zero the buffer without reallocating
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_has_guard() {
        let line = DelayLine::with_max_delay(100);
        assert_eq!(line.capacity(), 103);
        assert_eq!(line.max_delay(), 100);
    }

    #[test]
    fn test_zero_delay_reads_latest_write() {
        let mut line = DelayLine::with_max_delay(8);
        line.write(0.25);
        line.write(0.75);
        assert_eq!(line.read_integer(0), 0.75);
        assert_eq!(line.read_linear(0.0), 0.75);
        assert_eq!(line.read_cubic(0.0), 0.75);
        assert_eq!(line.read_integer(1), 0.25);
    }

    #[test]
    fn test_linear_midpoint() {
        let mut line = DelayLine::with_max_delay(8);
        line.write(1.0);
        line.write(0.0);
        assert!((line.read_linear(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cubic_reproduces_ramp() {
        let mut line = DelayLine::with_max_delay(16);
        for i in 0..16 {
            line.write(i as f64);
        }
        // Catmull-Rom is exact on linear data away from the edge
        let v = line.read_cubic(3.25);
        assert!((v - (15.0 - 3.25)).abs() < 1e-12);
    }

    #[test]
    fn test_delay_clamped_to_capacity() {
        let mut line = DelayLine::with_max_delay(4);
        for i in 0..10 {
            line.write(i as f64);
        }
        assert_eq!(line.read_linear(1000.0), line.read_integer(4));
        assert_eq!(line.read_cubic(-3.0), 9.0);
        assert_eq!(line.read_linear(f64::NAN), 9.0);
    }

    #[test]
    fn test_wraparound() {
        let mut line = DelayLine::with_max_delay(2);
        for i in 0..20 {
            line.write(i as f64);
            assert_eq!(line.read_integer(0), i as f64);
            if i >= 2 {
                assert_eq!(line.read_integer(2), (i - 2) as f64);
            }
        }
    }

    #[test]
    fn test_clear() {
        let mut line = DelayLine::with_max_delay(4);
        line.write(1.0);
        line.clear();
        for d in 0..=4 {
            assert_eq!(line.read_integer(d), 0.0);
        }
    }
}
