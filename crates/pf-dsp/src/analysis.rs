//! Signal measurement: level meters and FFT distortion analysis
//!
//! Used by tests, benches and host-side diagnostics; nothing here runs on
//! the audio thread.

use pf_core::Sample;
use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;

/// Root mean square
pub fn rms(signal: &[Sample]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|s| s * s).sum::<f64>() / signal.len() as f64).sqrt()
}

/// Absolute peak
pub fn peak(signal: &[Sample]) -> f64 {
    signal.iter().fold(0.0, |p: f64, s| p.max(s.abs()))
}

/// True when every sample is finite and within `limit`
pub fn is_bounded(signal: &[Sample], limit: f64) -> bool {
    signal.iter().all(|s| s.is_finite() && s.abs() <= limit)
}

/// Hann-windowed magnitude spectrum (`len/2 + 1` bins)
pub fn magnitude_spectrum(signal: &[Sample]) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return vec![0.0; n / 2 + 1];
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);

    let mut windowed: Vec<f64> = signal
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos());
            s * w
        })
        .collect();
    let mut spectrum = vec![Complex::new(0.0, 0.0); n / 2 + 1];
    let result = fft.process(&mut windowed, &mut spectrum);
    debug_assert!(result.is_ok(), "spectrum FFT length mismatch");

    spectrum.iter().map(|c| c.norm()).collect()
}

/// Total harmonic distortion as a ratio (0.01 = 1 %).
///
/// Sums power in a few bins around each of harmonics 2..=`harmonics` and
/// compares against the fundamental. Harmonics above Nyquist are skipped.
pub fn thd(signal: &[Sample], fundamental_hz: f64, sample_rate: f64, harmonics: usize) -> f64 {
    const SPREAD: usize = 3;

    let mags = magnitude_spectrum(signal);
    let bin_hz = sample_rate / signal.len().max(1) as f64;

    let band_power = |center_hz: f64| -> Option<f64> {
        let center = (center_hz / bin_hz).round() as usize;
        if center + SPREAD >= mags.len() {
            return None;
        }
        let lo = center.saturating_sub(SPREAD);
        Some(mags[lo..=center + SPREAD].iter().map(|m| m * m).sum())
    };

    let Some(fundamental) = band_power(fundamental_hz) else {
        return 0.0;
    };
    if fundamental <= 0.0 {
        return 0.0;
    }

    let harmonic_power: f64 = (2..=harmonics.max(2))
        .filter_map(|k| band_power(fundamental_hz * k as f64))
        .sum();

    (harmonic_power / fundamental).sqrt()
}

/// Sine of `freq` at `sample_rate`, `len` samples long
pub fn sine(freq: f64, sample_rate: f64, amplitude: f64, len: usize) -> Vec<Sample> {
    (0..len)
        .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin())
        .collect()
}
