//! Closed-form biquad design (RBJ Audio EQ Cookbook)
//!
//! All eight cookbook types share one intermediate: `w0 = 2π·f/fs`,
//! `alpha = sin(w0)/(2Q)`, and for peak/shelf `A = 10^(gainDb/40)`.
//! Coefficients are normalised so `a0 == 1`.
//!
//! Design inputs are clamped, never rejected: frequency into
//! `(0, 0.49·fs]`, Q into `[MIN_Q, MAX_Q]`, gain into ±`MAX_GAIN_DB`.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Lowest design frequency
pub const MIN_FREQ_HZ: f64 = 1.0;
/// Highest design frequency as a fraction of the sample rate
pub const MAX_FREQ_RATIO: f64 = 0.49;
pub const MIN_Q: f64 = 0.025;
pub const MAX_Q: f64 = 40.0;
pub const MAX_GAIN_DB: f64 = 36.0;

/// Biquad filter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Peak,
    LowShelf,
    HighShelf,
    Allpass,
}

impl FilterType {
    pub const ALL: [FilterType; 8] = [
        FilterType::Lowpass,
        FilterType::Highpass,
        FilterType::Bandpass,
        FilterType::Notch,
        FilterType::Peak,
        FilterType::LowShelf,
        FilterType::HighShelf,
        FilterType::Allpass,
    ];

    /// Map a stepped parameter value onto a type (clamped).
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&t| t == self).unwrap_or(0)
    }

    /// Whether `gain_db` participates in the design
    pub fn uses_gain(self) -> bool {
        matches!(self, Self::Peak | Self::LowShelf | Self::HighShelf)
    }
}

/// Design inputs of one filter section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub filter_type: FilterType,
    pub frequency: f64,
    pub q: f64,
    pub gain_db: f64,
}

impl FilterSpec {
    pub fn new(filter_type: FilterType, frequency: f64, q: f64, gain_db: f64) -> Self {
        Self {
            filter_type,
            frequency,
            q,
            gain_db,
        }
    }

    pub fn lowpass(frequency: f64, q: f64) -> Self {
        Self::new(FilterType::Lowpass, frequency, q, 0.0)
    }

    pub fn highpass(frequency: f64, q: f64) -> Self {
        Self::new(FilterType::Highpass, frequency, q, 0.0)
    }

    pub fn bandpass(frequency: f64, q: f64) -> Self {
        Self::new(FilterType::Bandpass, frequency, q, 0.0)
    }

    pub fn peak(frequency: f64, q: f64, gain_db: f64) -> Self {
        Self::new(FilterType::Peak, frequency, q, gain_db)
    }

    /// Copy with every input clamped into its legal range for `sample_rate`.
    pub fn clamped(self, sample_rate: f64) -> Self {
        let max_freq = (sample_rate * MAX_FREQ_RATIO).max(MIN_FREQ_HZ);
        let frequency = if self.frequency.is_finite() {
            self.frequency.clamp(MIN_FREQ_HZ, max_freq)
        } else {
            1000.0_f64.min(max_freq)
        };
        let q = if self.q.is_finite() {
            self.q.clamp(MIN_Q, MAX_Q)
        } else {
            std::f64::consts::FRAC_1_SQRT_2
        };
        let gain_db = if self.gain_db.is_finite() {
            self.gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
        } else {
            0.0
        };

        Self {
            filter_type: self.filter_type,
            frequency,
            q,
            gain_db,
        }
    }
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self::lowpass(1000.0, std::f64::consts::FRAC_1_SQRT_2)
    }
}

/// Shared cookbook intermediates
#[derive(Clone, Copy)]
struct Cookbook {
    cos_w0: f64,
    alpha: f64,
}

impl Cookbook {
    #[inline]
    fn new(freq: f64, q: f64, sample_rate: f64) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        Self {
            cos_w0: w0.cos(),
            alpha: w0.sin() / (2.0 * q),
        }
    }
}

/// Biquad coefficients (a0 normalised to 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    #[inline]
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let inv_a0 = 1.0 / a0;
        Self {
            b0: b0 * inv_a0,
            b1: b1 * inv_a0,
            b2: b2 * inv_a0,
            a1: a1 * inv_a0,
            a2: a2 * inv_a0,
        }
    }

    /// Design from a spec. Inputs are clamped first.
    pub fn design(spec: &FilterSpec, sample_rate: f64) -> Self {
        let s = spec.clamped(sample_rate);
        match s.filter_type {
            FilterType::Lowpass => Self::lowpass(s.frequency, s.q, sample_rate),
            FilterType::Highpass => Self::highpass(s.frequency, s.q, sample_rate),
            FilterType::Bandpass => Self::bandpass(s.frequency, s.q, sample_rate),
            FilterType::Notch => Self::notch(s.frequency, s.q, sample_rate),
            FilterType::Peak => Self::peaking(s.frequency, s.q, s.gain_db, sample_rate),
            FilterType::LowShelf => Self::low_shelf(s.frequency, s.q, s.gain_db, sample_rate),
            FilterType::HighShelf => Self::high_shelf(s.frequency, s.q, s.gain_db, sample_rate),
            FilterType::Allpass => Self::allpass(s.frequency, s.q, sample_rate),
        }
    }

    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let c = Cookbook::new(freq, q, sample_rate);
        let b1 = 1.0 - c.cos_w0;
        Self::normalized(
            b1 * 0.5,
            b1,
            b1 * 0.5,
            1.0 + c.alpha,
            -2.0 * c.cos_w0,
            1.0 - c.alpha,
        )
    }

    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let c = Cookbook::new(freq, q, sample_rate);
        let b0 = (1.0 + c.cos_w0) * 0.5;
        Self::normalized(
            b0,
            -(1.0 + c.cos_w0),
            b0,
            1.0 + c.alpha,
            -2.0 * c.cos_w0,
            1.0 - c.alpha,
        )
    }

    /// Constant 0 dB peak gain bandpass
    pub fn bandpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let c = Cookbook::new(freq, q, sample_rate);
        Self::normalized(
            c.alpha,
            0.0,
            -c.alpha,
            1.0 + c.alpha,
            -2.0 * c.cos_w0,
            1.0 - c.alpha,
        )
    }

    pub fn notch(freq: f64, q: f64, sample_rate: f64) -> Self {
        let c = Cookbook::new(freq, q, sample_rate);
        Self::normalized(
            1.0,
            -2.0 * c.cos_w0,
            1.0,
            1.0 + c.alpha,
            -2.0 * c.cos_w0,
            1.0 - c.alpha,
        )
    }

    pub fn allpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let c = Cookbook::new(freq, q, sample_rate);
        Self::normalized(
            1.0 - c.alpha,
            -2.0 * c.cos_w0,
            1.0 + c.alpha,
            1.0 + c.alpha,
            -2.0 * c.cos_w0,
            1.0 - c.alpha,
        )
    }

    pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let c = Cookbook::new(freq, q, sample_rate);
        Self::normalized(
            1.0 + c.alpha * a,
            -2.0 * c.cos_w0,
            1.0 - c.alpha * a,
            1.0 + c.alpha / a,
            -2.0 * c.cos_w0,
            1.0 - c.alpha / a,
        )
    }

    pub fn low_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let c = Cookbook::new(freq, q, sample_rate);
        let k = 2.0 * a.sqrt() * c.alpha;
        let (ap1, am1) = (a + 1.0, a - 1.0);
        Self::normalized(
            a * (ap1 - am1 * c.cos_w0 + k),
            2.0 * a * (am1 - ap1 * c.cos_w0),
            a * (ap1 - am1 * c.cos_w0 - k),
            ap1 + am1 * c.cos_w0 + k,
            -2.0 * (am1 + ap1 * c.cos_w0),
            ap1 + am1 * c.cos_w0 - k,
        )
    }

    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let c = Cookbook::new(freq, q, sample_rate);
        let k = 2.0 * a.sqrt() * c.alpha;
        let (ap1, am1) = (a + 1.0, a - 1.0);
        Self::normalized(
            a * (ap1 + am1 * c.cos_w0 + k),
            -2.0 * a * (am1 + ap1 * c.cos_w0),
            a * (ap1 + am1 * c.cos_w0 - k),
            ap1 - am1 * c.cos_w0 + k,
            2.0 * (am1 - ap1 * c.cos_w0),
            ap1 - am1 * c.cos_w0 - k,
        )
    }

    /// Bypass (unity gain, no filtering)
    pub const fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Evaluates |H(e^jw)| at `freq` in dB.
    pub fn magnitude_db(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt();
        pf_core::gain_to_db(num / den.max(f64::MIN_POSITIVE))
    }

    /// Both poles strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::bypass()
    }
}
