//! Offline sample-rate conversion for impulse responses
//!
//! Whole-buffer band-limited sinc conversion with rubato. The IR is padded
//! with silence so the filter tail is flushed, then the resampler's group
//! delay is trimmed so the onset stays aligned.

use pf_core::ImpulseResponse;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{FileError, FileResult};

const SINC_LEN: usize = 256;

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Resample every channel from `from_rate` to `to_rate`.
///
/// Output length is `ceil(len · to_rate / from_rate)`.
pub fn resample_channels(
    channels: &[Vec<f64>],
    from_rate: f64,
    to_rate: f64,
) -> FileResult<Vec<Vec<f64>>> {
    if !(from_rate > 0.0 && to_rate > 0.0) {
        return Err(FileError::Resample(format!(
            "invalid rates {from_rate} -> {to_rate}"
        )));
    }
    let len = channels.first().map_or(0, Vec::len);
    if channels.is_empty() || len == 0 || from_rate == to_rate {
        return Ok(channels.to_vec());
    }

    let ratio = to_rate / from_rate;
    let expected = (len as f64 * ratio).ceil() as usize;
    let padded_len = len + 2 * SINC_LEN;

    let mut resampler = SincFixedIn::<f64>::new(ratio, 1.0, sinc_params(), padded_len, channels.len())
        .map_err(|e| FileError::Resample(e.to_string()))?;

    let input: Vec<Vec<f64>> = channels
        .iter()
        .map(|ch| {
            let mut padded = Vec::with_capacity(padded_len);
            padded.extend_from_slice(ch);
            padded.resize(padded_len, 0.0);
            padded
        })
        .collect();

    let output = resampler
        .process(&input, None)
        .map_err(|e| FileError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    Ok(output
        .into_iter()
        .map(|ch| {
            let mut trimmed: Vec<f64> = ch.into_iter().skip(delay).take(expected).collect();
            trimmed.resize(expected, 0.0);
            trimmed
        })
        .collect())
}

/// Convert an IR to `target_rate`, unchanged when the rates already match.
pub fn resample_impulse_response(
    ir: ImpulseResponse,
    target_rate: f64,
) -> FileResult<ImpulseResponse> {
    if ir.sample_rate() == target_rate {
        return Ok(ir);
    }
    let from_rate = ir.sample_rate();
    log::debug!(
        "Resampling IR ({} frames): {from_rate} Hz -> {target_rate} Hz",
        ir.len()
    );
    let channels = resample_channels(ir.channels(), from_rate, target_rate)?;
    Ok(ImpulseResponse::new(channels, target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_untouched() {
        let ch = vec![vec![0.1, 0.2, 0.3]];
        assert_eq!(resample_channels(&ch, 48000.0, 48000.0).unwrap(), ch);
    }

    #[test]
    fn test_length_scales_with_ratio() {
        let ch = vec![vec![0.0; 4410], vec![0.0; 4410]];
        let out = resample_channels(&ch, 44100.0, 48000.0).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 4800);
        assert_eq!(out[1].len(), 4800);
    }

    #[test]
    fn test_dc_level_preserved() {
        let ch = vec![vec![0.5; 9600]];
        let out = resample_channels(&ch, 96000.0, 48000.0).unwrap();
        assert_eq!(out[0].len(), 4800);
        // Away from the edges the DC level survives conversion
        for &s in &out[0][1000..3800] {
            assert!((s - 0.5).abs() < 0.01, "{s}");
        }
    }

    #[test]
    fn test_invalid_rate() {
        assert!(resample_channels(&[vec![1.0]], 0.0, 48000.0).is_err());
    }
}
