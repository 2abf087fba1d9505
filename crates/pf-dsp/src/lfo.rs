//! Low-frequency oscillator
//!
//! Phase lives in `[0, 1)` and advances by `f / fs` per tick. Changing the
//! frequency only changes the increment, so modulation never jumps.
//! Output is bipolar `[-1, 1]`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

const DEFAULT_SEED: u64 = 0x5EED_1F0;

/// LFO waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    /// 50 % duty cycle
    Square,
    /// Rising ramp
    Saw,
    /// Sample-and-hold: a new random level every cycle
    Random,
}

impl Waveform {
    pub const ALL: [Waveform; 5] = [
        Waveform::Sine,
        Waveform::Triangle,
        Waveform::Square,
        Waveform::Saw,
        Waveform::Random,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }
}

#[inline]
fn wrap_phase(p: f64) -> f64 {
    let w = p - p.floor();
    // p.floor() rounding can leave exactly 1.0 for tiny negative inputs
    if w >= 1.0 { 0.0 } else { w }
}

/// Low-frequency oscillator with phase offset and seeded S&H source
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f64,
    increment: f64,
    frequency: f64,
    phase_offset: f64,
    waveform: Waveform,
    sample_rate: f64,
    held: f64,
    seed: u64,
    rng: ChaCha8Rng,
}

impl Lfo {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_seed(sample_rate, DEFAULT_SEED)
    }

    /// Distinct seeds decorrelate the random waveform between instances.
    pub fn with_seed(sample_rate: f64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let held = rng.random_range(-1.0..=1.0);
        Self {
            phase: 0.0,
            increment: 0.0,
            frequency: 0.0,
            phase_offset: 0.0,
            waveform: Waveform::Sine,
            sample_rate: sample_rate.max(1.0),
            held,
            seed,
            rng,
        }
    }

    /// Frequency in Hz, clamped to `[0, fs/2]`. Phase is preserved.
    pub fn set_frequency(&mut self, hz: f64) {
        let hz = if hz.is_finite() { hz } else { 0.0 };
        self.frequency = hz.clamp(0.0, self.sample_rate * 0.5);
        self.increment = self.frequency / self.sample_rate;
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    #[inline]
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Offset in cycles (0.25 = 90°), wrapped into `[0, 1)`.
    pub fn set_phase_offset(&mut self, offset: f64) {
        self.phase_offset = if offset.is_finite() {
            wrap_phase(offset)
        } else {
            0.0
        };
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
        self.set_frequency(self.frequency);
    }

    /// Value at the current phase without advancing
    #[inline]
    pub fn value(&self) -> f64 {
        let p = wrap_phase(self.phase + self.phase_offset);
        match self.waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Saw => 2.0 * p - 1.0,
            Waveform::Random => self.held,
        }
    }

    /// Evaluate, then advance one sample.
    #[inline]
    pub fn tick(&mut self) -> f64 {
        let out = self.value();
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            if self.phase >= 1.0 {
                self.phase = wrap_phase(self.phase);
            }
            self.held = self.rng.random_range(-1.0..=1.0);
        }
        out
    }

    /// `tick` mapped to `[0, 1]`
    #[inline]
    pub fn tick_unipolar(&mut self) -> f64 {
        0.5 * (self.tick() + 1.0)
    }

    /// Advance `samples` ticks at once (control-rate callers)
    pub fn advance(&mut self, samples: usize) -> f64 {
        let out = self.value();
        for _ in 0..samples {
            self.tick();
        }
        out
    }

    /// Phase to zero and the random source back to its seed.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.held = self.rng.random_range(-1.0..=1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sine_quarter_cycle() {
        let mut lfo = Lfo::new(1000.0);
        lfo.set_frequency(1.0);
        assert_eq!(lfo.tick(), 0.0);
        for _ in 0..249 {
            lfo.tick();
        }
        assert_relative_eq!(lfo.value(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_waveform_ranges() {
        for waveform in Waveform::ALL {
            let mut lfo = Lfo::new(48000.0);
            lfo.set_waveform(waveform);
            lfo.set_frequency(7.3);
            for _ in 0..48000 {
                let v = lfo.tick();
                assert!((-1.0..=1.0).contains(&v), "{waveform:?} produced {v}");
            }
        }
    }

    #[test]
    fn test_frequency_change_keeps_phase() {
        let mut lfo = Lfo::new(48000.0);
        lfo.set_frequency(2.0);
        for _ in 0..1000 {
            lfo.tick();
        }
        let phase = lfo.phase();
        lfo.set_frequency(5.0);
        assert_eq!(lfo.phase(), phase);
        lfo.set_sample_rate(96000.0);
        assert_eq!(lfo.phase(), phase);
    }

    #[test]
    fn test_phase_offset() {
        let mut a = Lfo::new(1000.0);
        let mut b = Lfo::new(1000.0);
        a.set_frequency(1.0);
        b.set_frequency(1.0);
        b.set_phase_offset(0.25);
        assert_relative_eq!(b.value(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(a.value(), 0.0, epsilon = 1e-12);
        b.set_phase_offset(-0.75);
        assert_relative_eq!(b.value(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_square_and_saw() {
        // Power-of-two rate keeps the phase increments exact
        let mut lfo = Lfo::new(128.0);
        lfo.set_frequency(1.0);
        lfo.set_waveform(Waveform::Square);
        let first: Vec<f64> = (0..128).map(|_| lfo.tick()).collect();
        assert!(first[..64].iter().all(|&v| v == 1.0));
        assert!(first[64..].iter().all(|&v| v == -1.0));

        lfo.reset();
        lfo.set_waveform(Waveform::Saw);
        assert_eq!(lfo.tick(), -1.0);
    }

    #[test]
    fn test_random_holds_for_a_cycle() {
        let mut lfo = Lfo::new(128.0);
        lfo.set_waveform(Waveform::Random);
        lfo.set_frequency(1.0);
        let cycle: Vec<f64> = (0..128).map(|_| lfo.tick()).collect();
        assert!(cycle.iter().all(|&v| v == cycle[0]));
        let next = lfo.tick();
        assert_ne!(next, cycle[0]);
    }

    #[test]
    fn test_reset_replays_random_sequence() {
        let mut lfo = Lfo::new(1000.0);
        lfo.set_waveform(Waveform::Random);
        lfo.set_frequency(50.0);
        let a: Vec<f64> = (0..500).map(|_| lfo.tick()).collect();
        lfo.reset();
        let b: Vec<f64> = (0..500).map(|_| lfo.tick()).collect();
        assert_eq!(a, b);
    }
}
